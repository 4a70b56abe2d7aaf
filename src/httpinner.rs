// File: httpinner.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use reqwest::header::{HeaderMap, LOCATION};

/// Snapshot of one fetched response, detached from the connection.
#[derive(Debug, Clone)]
pub struct HttpInner {
    body: String,
    headers: HeaderMap,
    status: u16,
    url: String,
}

impl HttpInner {
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn new() -> Self {
        HttpInner {
            body: "".to_string(),
            headers: HeaderMap::new(),
            status: 0,
            url: "".to_string(),
        }
    }

    pub fn new_with_all(headers: HeaderMap, body: String, status: u16, url: String) -> Self {
        HttpInner {
            body,
            headers,
            status,
            url,
        }
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302 | 303 | 307 | 308)
    }

    /// `Location` header value, lossily decoded when it is not valid UTF-8.
    pub fn location(&self) -> Option<String> {
        self.headers
            .get(LOCATION)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
    }

    pub fn set_body(&mut self, body: String) {
        self.body = body;
    }

    pub fn set_headers(&mut self, headers: HeaderMap) {
        self.headers = headers;
    }

    pub fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    pub fn set_url(&mut self, url: String) {
        self.url = url;
    }
}

impl Default for HttpInner {
    fn default() -> Self {
        Self::new()
    }
}
