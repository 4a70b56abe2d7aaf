// File: proxies.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use crate::errors::{ScanError, ScanResult};
use futures::stream::{FuturesUnordered, StreamExt};
use log::{debug, info, warn};
use rand::seq::IndexedRandom;
use reqwest::redirect::Policy;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const PROXY_CHECK_URL: &str = "https://www.google.com";

/// Reads one proxy URL per line. Blank lines and `#` comments are skipped.
pub fn load_proxies(path: &Path) -> ScanResult<Vec<String>> {
    let content = fs::read_to_string(path)?;
    let proxies: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect();
    info!("Loaded {} proxies from {}", proxies.len(), path.display());
    Ok(proxies)
}

async fn proxy_works(proxy: &str, check_url: &str, timeout: Duration) -> ScanResult<bool> {
    let client = reqwest::Client::builder()
        .proxy(reqwest::Proxy::all(proxy)?)
        .redirect(Policy::none())
        .timeout(timeout)
        .danger_accept_invalid_certs(true)
        .build()
        .map_err(|e| ScanError::Configuration(format!("proxy client for {}: {}", proxy, e)))?;
    let response = client.get(check_url).send().await?;
    Ok(response.status().as_u16() == 200)
}

/// Keeps the proxies through which `check_url` answers 200. All checks run
/// concurrently; the result order is unspecified.
pub async fn validate_proxies(
    proxies: &[String],
    check_url: &str,
    timeout: Duration,
) -> Vec<String> {
    let mut checks: FuturesUnordered<_> = proxies
        .iter()
        .map(|proxy| async move { (proxy, proxy_works(proxy, check_url, timeout).await) })
        .collect();

    let mut working = Vec::new();
    while let Some((proxy, result)) = checks.next().await {
        match result {
            Ok(true) => working.push(proxy.clone()),
            Ok(false) => debug!("Proxy {} did not return 200", proxy),
            Err(e) => warn!("Dropping proxy {}: {}", proxy, e),
        }
    }
    info!("{} of {} proxies are working", working.len(), proxies.len());
    working
}

/// Random pick, one proxy per scan.
pub fn choose_proxy(proxies: &[String]) -> Option<&str> {
    proxies.choose(&mut rand::rng()).map(String::as_str)
}
