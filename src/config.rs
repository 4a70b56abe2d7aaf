// File: config.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use crate::errors::{ScanError, ScanResult};
use rand::seq::IndexedRandom;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Browser identities the binary picks from, one per run.
pub const USER_AGENTS: &[&str] = &[
    DEFAULT_USER_AGENT,
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:89.0) Gecko/20100101 Firefox/89.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.1.1 Safari/605.1.15",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 14_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.0 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (Linux; Android 10; SM-G975F) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.120 Mobile Safari/537.36",
];

pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(DEFAULT_USER_AGENT)
}

#[derive(Debug, Clone)]
pub struct ConfigParameter {
    concurrency: usize,
    timeout: Duration,
    rate_limit: u32,
    proxy: Option<String>,
    user_agent: String,
    confirm_redirects: bool,
    show_progress: bool,
    insecure_tls: bool,
}

impl Default for ConfigParameter {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigParameter {
    pub fn new() -> Self {
        Self {
            concurrency: 10,
            timeout: Duration::from_secs(15),
            rate_limit: 0,
            proxy: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            confirm_redirects: true,
            show_progress: false,
            insecure_tls: true,
        }
    }

    pub fn set_concurrency(&mut self, concurrency: usize) {
        self.concurrency = concurrency;
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn set_timeout(&mut self, seconds: u64) {
        self.timeout = Duration::from_secs(seconds);
    }

    pub fn set_timeout_duration(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Per-request timeout, also the grace period for in-flight probes on cancel.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_rate_limit(&mut self, rate_limit: u32) {
        self.rate_limit = rate_limit;
    }

    /// Requests per second across the whole scan, 0 disables limiting.
    pub fn rate_limit(&self) -> u32 {
        self.rate_limit
    }

    pub fn set_proxy(&mut self, proxy: Option<String>) {
        self.proxy = proxy;
    }

    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    pub fn set_user_agent(&mut self, user_agent: String) {
        self.user_agent = user_agent;
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn set_confirm_redirects(&mut self, confirm_redirects: bool) {
        self.confirm_redirects = confirm_redirects;
    }

    pub fn confirm_redirects(&self) -> bool {
        self.confirm_redirects
    }

    pub fn set_show_progress(&mut self, show_progress: bool) {
        self.show_progress = show_progress;
    }

    pub fn show_progress(&self) -> bool {
        self.show_progress
    }

    pub fn set_insecure_tls(&mut self, insecure_tls: bool) {
        self.insecure_tls = insecure_tls;
    }

    pub fn insecure_tls(&self) -> bool {
        self.insecure_tls
    }

    pub fn validate(&self) -> ScanResult<()> {
        if self.concurrency == 0 {
            return Err(ScanError::Configuration(
                "concurrency must be a positive integer".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(ScanError::Configuration(
                "timeout must be a positive duration".to_string(),
            ));
        }
        if let Some(proxy) = &self.proxy {
            if proxy.trim().is_empty() {
                return Err(ScanError::Configuration("proxy must not be empty".to_string()));
            }
            reqwest::Proxy::all(proxy.as_str()).map_err(|e| {
                ScanError::Configuration(format!("invalid proxy {}: {}", proxy, e))
            })?;
        }
        Ok(())
    }
}
