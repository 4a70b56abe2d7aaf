// File: executor.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use crate::classifier::ResponseClassifier;
use crate::errors::{ScanError, ScanResult};
use crate::getstate::GetState;
use crate::http::Fetch;
use crate::httpinner::HttpInner;
use crate::injector::inject_payload;
use crate::probe::{Finding, Probe, ProbeOutcome};
use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use log::{debug, info, warn};
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::sync::Semaphore;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub outcome: ProbeOutcome,
    pub finding: Option<Finding>,
}

impl ProbeResult {
    fn errored(reason: String) -> Self {
        Self {
            outcome: ProbeOutcome::Errored(reason),
            finding: None,
        }
    }
}

/// Executes single probes: inject, fetch under a shared permit, classify,
/// and re-fetch once to confirm header redirects.
pub struct ProbeExecutor {
    fetcher: Arc<dyn Fetch>,
    permits: Arc<Semaphore>,
    rate_limiter: Option<Arc<DirectRateLimiter>>,
    confirm_redirects: bool,
    state: Arc<GetState>,
}

impl ProbeExecutor {
    pub fn new(
        fetcher: Arc<dyn Fetch>,
        concurrency: usize,
        rate_limit: u32,
        confirm_redirects: bool,
        state: Arc<GetState>,
    ) -> Self {
        let rate_limiter = NonZeroU32::new(rate_limit)
            .map(|rate| Arc::new(RateLimiter::direct(Quota::per_second(rate))));
        Self {
            fetcher,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            rate_limiter,
            confirm_redirects,
            state,
        }
    }

    pub fn state(&self) -> &Arc<GetState> {
        &self.state
    }

    /// Permits not currently held by an in-flight request.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    async fn request(&self, url: &str) -> ScanResult<HttpInner> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ScanError::Transport("request permits closed".to_string()))?;
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }
        self.state.add_request();
        self.fetcher.fetch(url).await
    }

    fn log_failure(probe: &Probe, error: &ScanError) {
        match error {
            ScanError::Timeout(_) => warn!("Timeout while testing: {}", probe.url),
            e if e.is_transport() => warn!("Request error for {}: {}", probe.url, e),
            e => warn!("Unexpected error testing {}: {}", probe.url, e),
        }
    }

    pub async fn execute(&self, probe: &Probe) -> ProbeResult {
        let target = match inject_payload(&probe.url, &probe.param, probe.payload.as_str()) {
            Ok(target) => target,
            Err(e) => {
                Self::log_failure(probe, &e);
                return ProbeResult::errored(e.to_string());
            }
        };

        let response = match self.request(&target).await {
            Ok(response) => response,
            Err(e) => {
                Self::log_failure(probe, &e);
                return ProbeResult::errored(e.to_string());
            }
        };

        let mut outcome = ResponseClassifier::classify(&response, &probe.payload);

        if self.confirm_redirects && matches!(outcome, ProbeOutcome::VulnerableByHeader { .. }) {
            outcome = match self.request(&target).await {
                Ok(second) if ResponseClassifier::confirms_redirect(&second, &probe.payload) => {
                    outcome
                }
                Ok(second) => {
                    debug!(
                        "Redirect for {} [{}={}] not confirmed, second response {} {:?}",
                        probe.url,
                        probe.param,
                        probe.payload,
                        second.status(),
                        second.location()
                    );
                    ProbeOutcome::NotVulnerable
                }
                Err(e) => {
                    Self::log_failure(probe, &e);
                    ProbeOutcome::Errored(e.to_string())
                }
            };
        }

        let finding = Finding::from_outcome(probe, response.status(), &outcome);
        if let Some(finding) = &finding {
            info!(
                "Open redirect via {} in {} [{}={}] -> {}",
                finding.channel, finding.url, finding.param, finding.payload, finding.redirect_location
            );
        }
        ProbeResult { outcome, finding }
    }
}
