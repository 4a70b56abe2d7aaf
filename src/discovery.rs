// File: discovery.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use crate::catalog::PayloadCatalog;
use crate::http::Fetch;
use crate::injector::query_params;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use url::Url;

pub const WAYBACK_ENDPOINT: &str = "http://web.archive.org";

static LINK_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?is)<(?:a|link|script|img|iframe|form)\b[^>]*?\b(?:href|src|action)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#,
    )
    .unwrap()
});

/// Adds `https://` to bare domains. Returns `None` for unusable input.
pub fn normalize_target(target: &str) -> Option<Url> {
    let target = target.trim();
    if target.is_empty() || target.starts_with('#') {
        return None;
    }
    let candidate = if target.starts_with("http://") || target.starts_with("https://") {
        target.to_string()
    } else {
        format!("https://{}", target)
    };
    match Url::parse(&candidate) {
        Ok(url) if url.host_str().is_some() => Some(url),
        _ => None,
    }
}

/// Absolute http(s) links found in anchor, link, script, img, iframe and
/// form tags, resolved against `base`.
pub fn extract_links(html: &str, base: &Url) -> HashSet<String> {
    LINK_ATTR
        .captures_iter(html)
        .filter_map(|caps| caps.get(1).or(caps.get(2)).or(caps.get(3)))
        .map(|m| m.as_str().trim())
        .filter(|link| !link.is_empty() && !link.starts_with('#'))
        .filter_map(|link| base.join(link).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .map(|mut url| {
            url.set_fragment(None);
            url.to_string()
        })
        .collect()
}

/// Finds candidate URLs for a target. Any source failure counts as
/// "nothing found" for that source.
pub struct UrlDiscovery {
    fetcher: Arc<dyn Fetch>,
    catalog: PayloadCatalog,
    wayback_endpoint: Option<String>,
}

impl UrlDiscovery {
    pub fn new(fetcher: Arc<dyn Fetch>, catalog: PayloadCatalog) -> Self {
        Self {
            fetcher,
            catalog,
            wayback_endpoint: None,
        }
    }

    /// Also query a Wayback Machine CDX endpoint for archived URLs.
    pub fn with_wayback(mut self, endpoint: impl Into<String>) -> Self {
        self.wayback_endpoint = Some(endpoint.into().trim_end_matches('/').to_string());
        self
    }

    pub fn has_redirect_param(&self, url: &str) -> bool {
        Url::parse(url)
            .map(|parsed| {
                query_params(&parsed)
                    .iter()
                    .any(|(name, _)| self.catalog.matches_redirect_param(name))
            })
            .unwrap_or(false)
    }

    pub async fn discover_urls(&self, target: &str) -> HashSet<String> {
        let Some(base) = normalize_target(target) else {
            warn!("Ignoring unusable target: {}", target);
            return HashSet::new();
        };

        let mut urls = HashSet::new();
        urls.insert(base.to_string());
        urls.extend(self.crawl(&base).await);
        if let Some(endpoint) = &self.wayback_endpoint {
            urls.extend(self.wayback(endpoint, &base).await);
        }

        let filtered: HashSet<String> = urls
            .into_iter()
            .filter(|url| self.has_redirect_param(url))
            .collect();
        info!(
            "Discovered {} URLs with redirect parameters for {}",
            filtered.len(),
            target
        );
        filtered
    }

    async fn crawl(&self, base: &Url) -> HashSet<String> {
        match self.fetcher.fetch(base.as_str()).await {
            Ok(response) if response.status() == 200 => extract_links(response.body(), base),
            Ok(response) => {
                debug!("Crawl of {} returned {}", base, response.status());
                HashSet::new()
            }
            Err(e) => {
                warn!("Crawling error for {}: {}", base, e);
                HashSet::new()
            }
        }
    }

    async fn wayback(&self, endpoint: &str, base: &Url) -> HashSet<String> {
        let Some(host) = base.host_str() else {
            return HashSet::new();
        };
        let query = format!(
            "{}/cdx/search/cdx?url={}/*&output=json&fl=original&collapse=urlkey",
            endpoint, host
        );
        let response = match self.fetcher.fetch(&query).await {
            Ok(response) if response.status() == 200 => response,
            Ok(response) => {
                debug!("Wayback returned {} for {}", response.status(), host);
                return HashSet::new();
            }
            Err(e) => {
                warn!("Wayback Machine error for {}: {}", host, e);
                return HashSet::new();
            }
        };

        match serde_json::from_str::<Value>(response.body()) {
            Ok(Value::Array(rows)) => rows
                .iter()
                .skip(1)
                .filter_map(|row| row.get(0).and_then(Value::as_str))
                .map(str::to_string)
                .collect(),
            Ok(_) => HashSet::new(),
            Err(e) => {
                warn!("Unreadable Wayback response for {}: {}", host, e);
                HashSet::new()
            }
        }
    }
}
