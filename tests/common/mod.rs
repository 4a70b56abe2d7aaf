// File: common/mod.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025
// - Volker Schwaberow <volker@schwaberow.de>

#![allow(dead_code)]

use futures::future::BoxFuture;
use redirprobe::catalog::{Payload, PayloadCatalog, RedirectParamMatcher};
use redirprobe::config::ConfigParameter;
use redirprobe::errors::ScanResult;
use redirprobe::http::Fetch;
use redirprobe::httpinner::HttpInner;
use redirprobe::injector::query_value;
use reqwest::header::{HeaderMap, HeaderValue, LOCATION};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use wiremock::{MockServer, ResponseTemplate};

pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

pub fn create_redirect_response(status: u16, location: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).append_header("location", location)
}

pub fn create_html_response(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(content)
        .append_header("content-type", "text/html")
}

pub fn meta_refresh_page(target: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta http-equiv="refresh" content="0;url={}"></head>
<body>Redirecting...</body>
</html>"#,
        target
    )
}

/// Quiet config with a short timeout, suited to local mock servers.
pub fn test_config(concurrency: usize) -> ConfigParameter {
    let mut config = ConfigParameter::new();
    config.set_concurrency(concurrency);
    config.set_timeout_duration(Duration::from_secs(2));
    config.set_show_progress(false);
    config
}

pub fn catalog_of(payloads: &[&str]) -> PayloadCatalog {
    PayloadCatalog::new(
        payloads.iter().map(|p| Payload::new(*p)),
        RedirectParamMatcher::default(),
    )
}

pub fn redirect_inner(status: u16, location: &str, url: &str) -> HttpInner {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(location) {
        headers.insert(LOCATION, value);
    }
    HttpInner::new_with_all(headers, String::new(), status, url.to_string())
}

pub fn ok_inner(body: &str, url: &str) -> HttpInner {
    HttpInner::new_with_all(HeaderMap::new(), body.to_string(), 200, url.to_string())
}

/// In-process `Fetch` that answers through `responder` after `delay`, and
/// records call counts and the peak number of concurrent calls.
pub struct FakeFetch<F> {
    responder: F,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl<F> FakeFetch<F>
where
    F: Fn(&str) -> ScanResult<HttpInner> + Send + Sync,
{
    pub fn new(delay: Duration, responder: F) -> Self {
        Self {
            responder,
            delay,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl<F> Fetch for FakeFetch<F>
where
    F: Fn(&str) -> ScanResult<HttpInner> + Send + Sync,
{
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, ScanResult<HttpInner>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            (self.responder)(url)
        })
    }
}

/// Responder for a target that redirects wherever `param` points.
pub fn reflecting(param: &'static str) -> impl Fn(&str) -> ScanResult<HttpInner> + Send + Sync {
    move |url: &str| {
        let location = query_value(url, param).unwrap_or_default();
        Ok(redirect_inner(302, &location, url))
    }
}
