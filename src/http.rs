// File: http.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use crate::config::ConfigParameter;
use crate::errors::{ScanError, ScanResult};
use crate::httpinner::HttpInner;
use futures::future::BoxFuture;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::redirect::Policy;

/// The network seam of the engine: one GET, redirects not followed.
pub trait Fetch: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, ScanResult<HttpInner>>;
}

/// reqwest-backed fetcher. The client and its connection pool are built
/// once and shared by every probe of a scan.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &ConfigParameter) -> ScanResult<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
        let user_agent = HeaderValue::from_str(config.user_agent()).map_err(|e| {
            ScanError::Configuration(format!("invalid user agent: {}", e))
        })?;
        headers.insert(USER_AGENT, user_agent);

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .redirect(Policy::none())
            .timeout(config.timeout())
            .pool_max_idle_per_host(config.concurrency())
            .danger_accept_invalid_certs(config.insecure_tls());

        if let Some(proxy) = config.proxy() {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| ScanError::Configuration(format!("invalid proxy: {}", e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| ScanError::Configuration(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    async fn get(&self, url: &str) -> ScanResult<HttpInner> {
        let response = self.client.get(url).send().await?;
        let final_url = response.url().to_string();
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await?;
        debug!("GET {} -> {} ({} bytes)", final_url, status, body.len());
        Ok(HttpInner::new_with_all(headers, body, status, final_url))
    }
}

impl Fetch for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, ScanResult<HttpInner>> {
        Box::pin(self.get(url))
    }
}
