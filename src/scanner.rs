// File: scanner.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use crate::catalog::PayloadCatalog;
use crate::config::ConfigParameter;
use crate::errors::ScanResult;
use crate::executor::{ProbeExecutor, ProbeResult};
use crate::getstate::GetState;
use crate::http::{Fetch, HttpFetcher};
use crate::injector::query_params;
use crate::probe::{Finding, Probe, ProbeOutcome};
use crate::tested::TestedSet;
use indicatif::{ProgressBar, ProgressState, ProgressStyle};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fmt::Write;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    Completed,
    Cancelled,
}

/// Result of one `scan` call. Findings are in completion order.
#[derive(Debug, Clone)]
pub struct ScanReport {
    findings: Vec<Finding>,
    status: ScanStatus,
    probes_planned: usize,
    probes_completed: usize,
    probes_errored: usize,
}

impl ScanReport {
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn into_findings(self) -> Vec<Finding> {
        self.findings
    }

    pub fn status(&self) -> ScanStatus {
        self.status
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == ScanStatus::Cancelled
    }

    pub fn probes_planned(&self) -> usize {
        self.probes_planned
    }

    pub fn probes_completed(&self) -> usize {
        self.probes_completed
    }

    pub fn probes_errored(&self) -> usize {
        self.probes_errored
    }
}

/// Turns candidate URLs into probes and runs them on a bounded worker pool.
pub struct RedirectScanner {
    config: ConfigParameter,
    catalog: PayloadCatalog,
    executor: Arc<ProbeExecutor>,
    tested: Arc<TestedSet>,
    state: Arc<GetState>,
}

impl RedirectScanner {
    pub fn new(config: ConfigParameter, catalog: PayloadCatalog) -> ScanResult<Self> {
        let fetcher = HttpFetcher::new(&config)?;
        Self::with_fetcher(config, catalog, Arc::new(fetcher))
    }

    pub fn with_fetcher(
        config: ConfigParameter,
        catalog: PayloadCatalog,
        fetcher: Arc<dyn Fetch>,
    ) -> ScanResult<Self> {
        config.validate()?;
        let state = Arc::new(GetState::new());
        let executor = Arc::new(ProbeExecutor::new(
            fetcher,
            config.concurrency(),
            config.rate_limit(),
            config.confirm_redirects(),
            Arc::clone(&state),
        ));
        Ok(Self {
            config,
            catalog,
            executor,
            tested: Arc::new(TestedSet::new()),
            state,
        })
    }

    /// Shares an existing tested set, e.g. one loaded from a resume file.
    pub fn with_tested_set(mut self, tested: Arc<TestedSet>) -> Self {
        self.tested = tested;
        self
    }

    pub fn tested(&self) -> &Arc<TestedSet> {
        &self.tested
    }

    pub fn state(&self) -> &Arc<GetState> {
        &self.state
    }

    pub fn catalog(&self) -> &PayloadCatalog {
        &self.catalog
    }

    /// Redirect-capable (name, original value) pairs of `url`.
    pub fn redirect_params(&self, url: &Url) -> Vec<(String, String)> {
        query_params(url)
            .into_iter()
            .filter(|(name, _)| self.catalog.matches_redirect_param(name))
            .collect()
    }

    /// Enumerates probes for every URL not tested before, marking each
    /// URL tested. Malformed URLs are skipped.
    pub fn plan<I, S>(&self, urls: I) -> Vec<Probe>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut probes = Vec::new();
        for raw in urls {
            let raw = raw.as_ref().trim();
            if raw.is_empty() {
                continue;
            }
            let parsed = match Url::parse(raw) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!("Skipping malformed URL {}: {}", raw, e);
                    continue;
                }
            };
            if !self.tested.insert(raw) {
                debug!("Already tested, skipping: {}", raw);
                continue;
            }
            info!("Testing URL: {}", raw);

            for (param, original_value) in self.redirect_params(&parsed) {
                for payload in self.catalog.payloads_for(&param) {
                    probes.push(Probe::new(raw, param.as_str(), original_value.as_str(), payload));
                }
            }
        }
        probes
    }

    pub async fn scan<I, S>(&self, urls: I) -> ScanReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.scan_until(urls, std::future::pending()).await
    }

    /// Like `scan`, but stops dispatching once `shutdown` resolves. Probes
    /// in flight get one request timeout to finish, then are aborted;
    /// findings confirmed so far are returned. URLs none of whose probes
    /// left the queue are taken back out of the tested set.
    pub async fn scan_until<I, S, F>(&self, urls: I, shutdown: F) -> ScanReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: Future<Output = ()>,
    {
        let probes = self.plan(urls);
        let planned = probes.len();
        self.state.add_total(planned as u64);
        self.state.mark_started();

        let mut report = ScanReport {
            findings: Vec::new(),
            status: ScanStatus::Completed,
            probes_planned: planned,
            probes_completed: 0,
            probes_errored: 0,
        };
        if planned == 0 {
            debug!("No probes to dispatch");
            self.state.mark_finished();
            return report;
        }

        let mut planned_per_url: HashMap<String, usize> = HashMap::new();
        for probe in &probes {
            *planned_per_url.entry(probe.url.clone()).or_default() += 1;
        }

        let pb = self.progress_bar(planned as u64);
        let queue = Arc::new(Mutex::new(probes.into_iter()));
        let (result_tx, mut result_rx) = mpsc::unbounded_channel::<ProbeResult>();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let grace = self.config.timeout();

        let mut workers = JoinSet::new();
        for _ in 0..self.config.concurrency().min(planned) {
            workers.spawn(probe_worker(
                Arc::clone(&queue),
                Arc::clone(&self.executor),
                result_tx.clone(),
                cancel_rx.clone(),
                grace,
            ));
        }
        drop(result_tx);

        tokio::pin!(shutdown);
        let mut shutdown_seen = false;
        loop {
            tokio::select! {
                _ = &mut shutdown, if !shutdown_seen => {
                    shutdown_seen = true;
                    report.status = ScanStatus::Cancelled;
                    warn!("Scan interrupted, waiting up to {:?} for in-flight probes", grace);
                    let _ = cancel_tx.send(true);
                }
                message = result_rx.recv() => match message {
                    Some(result) => {
                        pb.inc(1);
                        self.record(&mut report, result);
                    }
                    None => break,
                },
            }
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                warn!("Probe worker failed: {}", e);
            }
        }

        if report.is_cancelled() {
            self.release_undispatched(&queue, &planned_per_url);
        }

        pb.finish();
        self.state.mark_finished();
        report
    }

    fn release_undispatched(
        &self,
        queue: &Mutex<std::vec::IntoIter<Probe>>,
        planned_per_url: &HashMap<String, usize>,
    ) {
        let mut guard = match queue.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let remaining: Vec<Probe> = guard.by_ref().collect();
        drop(guard);

        let mut left: HashMap<&str, usize> = HashMap::new();
        for probe in &remaining {
            *left.entry(probe.url.as_str()).or_default() += 1;
        }
        for (url, count) in left {
            if planned_per_url.get(url) == Some(&count) && self.tested.remove(url) {
                debug!("Never dispatched, left untested: {}", url);
            }
        }
    }

    fn record(&self, report: &mut ScanReport, result: ProbeResult) {
        self.state.add_completed();
        report.probes_completed += 1;
        if let ProbeOutcome::Errored(reason) = &result.outcome {
            debug!("Probe errored: {}", reason);
            self.state.add_errored();
            report.probes_errored += 1;
        }
        if let Some(finding) = result.finding {
            self.state.add_finding();
            report.findings.push(finding);
        }
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.config.show_progress() {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len);
        if let Ok(style) = ProgressStyle::with_template(
            "[{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})",
        ) {
            pb.set_style(
                style
                    .with_key("eta", |state: &ProgressState, w: &mut dyn Write| {
                        let _ = write!(w, "{:.1}s", state.eta().as_secs_f64());
                    })
                    .progress_chars("█▉▊▋▌▍▎▏  "),
            );
        }
        pb
    }
}

async fn wait_cancelled(cancel: &mut watch::Receiver<bool>) {
    while !*cancel.borrow_and_update() {
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn probe_worker(
    queue: Arc<Mutex<std::vec::IntoIter<Probe>>>,
    executor: Arc<ProbeExecutor>,
    results: mpsc::UnboundedSender<ProbeResult>,
    mut cancel: watch::Receiver<bool>,
    grace: Duration,
) {
    loop {
        if *cancel.borrow() {
            break;
        }
        let next = match queue.lock() {
            Ok(mut queue) => queue.next(),
            Err(_) => None,
        };
        let Some(probe) = next else {
            break;
        };

        let mut execution = Box::pin(executor.execute(&probe));
        let finished = tokio::select! {
            result = &mut execution => Some(result),
            _ = wait_cancelled(&mut cancel) => None,
        };
        let result = match finished {
            Some(result) => Some(result),
            None => match tokio::time::timeout(grace, execution).await {
                Ok(result) => Some(result),
                Err(_) => {
                    debug!("Aborted in-flight probe for {}", probe.url);
                    None
                }
            },
        };

        match result {
            Some(result) => {
                if results.send(result).is_err() {
                    break;
                }
            }
            None => break,
        }
    }
}
