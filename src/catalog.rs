// File: catalog.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use crate::payloads::{default_payloads, REDIRECT_PARAMS, REDIRECT_TOKENS};
use percent_encoding::percent_decode_str;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Keywords shorter than this only match a whole token, longer ones also
/// match as a token prefix ("redirected", "callbackurl").
const PREFIX_MATCH_MIN_LEN: usize = 4;

/// An adversarial redirect target. The marker is what must show up in a
/// response to prove the redirect went where the payload pointed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Payload {
    raw: String,
    marker: Option<String>,
}

impl Payload {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let marker = derive_marker(&raw);
        Self { raw, marker }
    }

    /// Use an explicit marker instead of the derived authority.
    pub fn with_marker(raw: impl Into<String>, marker: impl Into<String>) -> Self {
        let marker = marker.into().to_lowercase();
        Self {
            raw: raw.into(),
            marker: if marker.is_empty() { None } else { Some(marker) },
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Lowercased host the payload points at, if it has one.
    pub fn marker(&self) -> Option<&str> {
        self.marker.as_deref()
    }

    /// Authority component as written (userinfo and port included), the
    /// way a URL parser reports a netloc.
    pub fn authority(&self) -> Option<&str> {
        let rest = if let Some(idx) = self.raw.find("://") {
            let scheme = &self.raw[..idx];
            if !is_scheme(scheme) {
                return None;
            }
            &self.raw[idx + 3..]
        } else if let Some(rest) = self.raw.strip_prefix("//") {
            rest
        } else {
            return None;
        };
        let end = rest
            .find(|c: char| c == '/' || c == '?' || c == '#')
            .unwrap_or(rest.len());
        let authority = &rest[..end];
        if authority.is_empty() {
            None
        } else {
            Some(authority)
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl From<&str> for Payload {
    fn from(raw: &str) -> Self {
        Payload::new(raw)
    }
}

fn is_scheme(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
}

fn host_of(authority_and_rest: &str) -> Option<String> {
    let end = authority_and_rest
        .find(|c: char| {
            matches!(c, '/' | '?' | '#' | '\\' | '\'' | '"' | '<' | '>' | '(' | ')' | '`')
                || c.is_whitespace()
                || c.is_control()
        })
        .unwrap_or(authority_and_rest.len());
    let authority = &authority_and_rest[..end];
    let host_port = authority.rsplit('@').next().unwrap_or(authority);
    let host = if host_port.starts_with('[') {
        match host_port.find(']') {
            Some(close) => &host_port[..=close],
            None => host_port,
        }
    } else {
        host_port.split(':').next().unwrap_or(host_port)
    };
    if host.is_empty() {
        None
    } else {
        Some(host.to_lowercase())
    }
}

/// Derives the host a payload redirects to. Handles scheme URLs,
/// protocol-relative and backslash-prefixed forms, percent-encoded
/// payloads and absolute URLs embedded in markup.
pub fn derive_marker(raw: &str) -> Option<String> {
    let decoded = percent_decode_str(raw.trim()).decode_utf8_lossy();
    let candidate = decoded.trim();

    if let Some(idx) = candidate.find("://") {
        if is_scheme(&candidate[..idx]) {
            return host_of(&candidate[idx + 3..]);
        }
    }

    let lead = candidate
        .chars()
        .take_while(|c| *c == '/' || *c == '\\')
        .count();
    if lead >= 2 || (lead == 1 && candidate.starts_with('\\')) || candidate.starts_with("/\\") {
        let rest = candidate.trim_start_matches(['/', '\\']);
        let rest = rest.strip_prefix("?\\").unwrap_or(rest);
        return host_of(rest);
    }

    // Absolute URL embedded in markup or a nested query.
    let bytes = candidate.as_bytes();
    let mut search_from = 0;
    while let Some(pos) = candidate[search_from..].find("://") {
        let idx = search_from + pos;
        let start = candidate[..idx]
            .rfind(|c: char| !(c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.'))
            .map(|p| p + 1)
            .unwrap_or(0);
        if start < idx && bytes[start].is_ascii_alphabetic() {
            return host_of(&candidate[idx + 3..]);
        }
        search_from = idx + 3;
    }
    None
}

/// Splits a parameter name into lowercase tokens on separators and
/// lower-to-upper camel case boundaries.
pub fn tokenize_param(name: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for c in name.chars() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Decides whether a query parameter can influence navigation.
#[derive(Debug, Clone)]
pub struct RedirectParamMatcher {
    names: HashSet<String>,
    tokens: Vec<String>,
}

impl RedirectParamMatcher {
    pub fn new<N, T>(names: N, tokens: T) -> Self
    where
        N: IntoIterator,
        N::Item: AsRef<str>,
        T: IntoIterator,
        T::Item: AsRef<str>,
    {
        Self {
            names: names
                .into_iter()
                .map(|n| n.as_ref().to_lowercase())
                .collect(),
            tokens: tokens
                .into_iter()
                .map(|t| t.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// Exact, case-insensitive membership in the curated list.
    pub fn matches_curated(&self, name: &str) -> bool {
        self.names.contains(&name.to_lowercase())
    }

    /// Whole-token keyword match on the tokenized name.
    pub fn matches_pattern(&self, name: &str) -> bool {
        tokenize_param(name).iter().any(|token| {
            self.tokens.iter().any(|kw| {
                token == kw || (kw.len() >= PREFIX_MATCH_MIN_LEN && token.starts_with(kw.as_str()))
            })
        })
    }

    pub fn matches(&self, name: &str) -> bool {
        self.matches_curated(name) || self.matches_pattern(name)
    }
}

impl Default for RedirectParamMatcher {
    fn default() -> Self {
        Self::new(REDIRECT_PARAMS.iter(), REDIRECT_TOKENS.iter())
    }
}

/// Immutable payload list plus parameter rules, shared by every probe of a scan.
#[derive(Debug, Clone)]
pub struct PayloadCatalog {
    payloads: Arc<Vec<Payload>>,
    matcher: RedirectParamMatcher,
}

impl PayloadCatalog {
    pub fn new<I>(payloads: I, matcher: RedirectParamMatcher) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Payload>,
    {
        let mut seen = HashSet::new();
        let payloads = payloads
            .into_iter()
            .map(Into::into)
            .filter(|p: &Payload| seen.insert(p.as_str().to_string()))
            .collect();
        Self {
            payloads: Arc::new(payloads),
            matcher,
        }
    }

    pub fn payloads(&self) -> &[Payload] {
        &self.payloads
    }

    pub fn matcher(&self) -> &RedirectParamMatcher {
        &self.matcher
    }

    pub fn matches_redirect_param(&self, name: &str) -> bool {
        self.matcher.matches(name)
    }

    /// Payloads worth sending for `param`. JSONP style callbacks get script
    /// payloads, file style parameters get filesystem payloads, everything
    /// else the whole list. A narrowing that selects nothing falls back to
    /// the whole list.
    pub fn payloads_for(&self, param: &str) -> Vec<Payload> {
        let lowered = param.to_lowercase();
        let narrowed: Vec<Payload> = match lowered.as_str() {
            "callback" | "jsonp" => self
                .payloads
                .iter()
                .filter(|p| p.as_str().contains("javascript") || p.as_str().contains("alert"))
                .cloned()
                .collect(),
            "file" | "path" | "src" => self
                .payloads
                .iter()
                .filter(|p| p.as_str().contains("file://") || p.as_str().contains("/etc/passwd"))
                .cloned()
                .collect(),
            _ => return self.payloads.to_vec(),
        };
        if narrowed.is_empty() {
            self.payloads.to_vec()
        } else {
            narrowed
        }
    }

    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }
}

impl Default for PayloadCatalog {
    fn default() -> Self {
        Self::new(default_payloads(), RedirectParamMatcher::default())
    }
}

impl From<String> for Payload {
    fn from(raw: String) -> Self {
        Payload::new(raw)
    }
}
