// File: classifier.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use crate::catalog::Payload;
use crate::httpinner::HttpInner;
use crate::probe::ProbeOutcome;
use log::{debug, trace};
use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::Regex;

const MAX_DECODE_ROUNDS: usize = 3;

static META_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<meta\b[^>]*>").unwrap());

static HTTP_EQUIV_REFRESH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\bhttp-equiv\s*=\s*["']?\s*refresh\b"#).unwrap()
});

static CONTENT_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)\bcontent\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#).unwrap()
});

static REFRESH_CONTENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)^\s*\d*(?:\.\d*)?\s*[;,]?\s*(?:url\s*=\s*)?(.*)$"#).unwrap()
});

static SCRIPT_NAVIGATION: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(r#"(?i)window\.location\.href\s*=\s*["']([^"']+)["']"#).unwrap(),
            "window.location.href",
        ),
        (
            Regex::new(r#"(?i)window\.location\s*=\s*["']([^"']+)["']"#).unwrap(),
            "window.location",
        ),
        (
            Regex::new(r#"(?i)window\.location\.replace\s*\(\s*["']([^"']+)["']\s*\)"#).unwrap(),
            "window.location.replace",
        ),
        (
            Regex::new(r#"(?i)location\.replace\s*\(\s*["']([^"']+)["']\s*\)"#).unwrap(),
            "location.replace",
        ),
        (
            Regex::new(r#"(?i)location\.href\s*=\s*["']([^"']+)["']"#).unwrap(),
            "location.href",
        ),
        (
            Regex::new(r#"(?i)\blocation\s*=\s*["']([^"']+)["']"#).unwrap(),
            "location",
        ),
        (
            Regex::new(r#"(?i)window\.open\s*\(\s*["']([^"']+)["']"#).unwrap(),
            "window.open",
        ),
        (
            Regex::new(r#"(?i)window\.navigate\s*\(\s*["']([^"']+)["']\s*\)"#).unwrap(),
            "window.navigate",
        ),
    ]
});

/// Percent-decodes until the value stops changing, so double-encoded
/// locations are compared in their final form.
pub fn fully_decode(value: &str) -> String {
    let mut current = value.to_string();
    for _ in 0..MAX_DECODE_ROUNDS {
        let decoded = percent_decode_str(&current).decode_utf8_lossy().into_owned();
        if decoded == current {
            break;
        }
        current = decoded;
    }
    current
}

/// Named predicates over a redirect target, evaluated in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationRule {
    ExactMarker,
    PercentDecoded,
    ProtocolRelative,
    Similarity,
}

impl LocationRule {
    /// Full chain used for first-pass classification.
    pub const ALL: [LocationRule; 4] = [
        LocationRule::ExactMarker,
        LocationRule::PercentDecoded,
        LocationRule::ProtocolRelative,
        LocationRule::Similarity,
    ];

    /// Marker-only chain used when confirming a header redirect.
    pub const STRICT: [LocationRule; 3] = [
        LocationRule::ExactMarker,
        LocationRule::PercentDecoded,
        LocationRule::ProtocolRelative,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            LocationRule::ExactMarker => "exact-marker",
            LocationRule::PercentDecoded => "percent-decoded",
            LocationRule::ProtocolRelative => "protocol-relative",
            LocationRule::Similarity => "similarity",
        }
    }

    pub fn matches(&self, location: &str, payload: &Payload) -> bool {
        match self {
            LocationRule::ExactMarker => payload
                .marker()
                .is_some_and(|m| location.to_lowercase().contains(m)),
            LocationRule::PercentDecoded => payload
                .marker()
                .is_some_and(|m| fully_decode(location).to_lowercase().contains(m)),
            LocationRule::ProtocolRelative => {
                let trimmed = location.trim_start();
                match (trimmed.strip_prefix("//"), payload.marker()) {
                    (Some(rest), Some(m)) => fully_decode(rest).to_lowercase().contains(m),
                    _ => false,
                }
            }
            LocationRule::Similarity => is_similar_redirect(location, payload),
        }
    }
}

/// First matching rule in `rules`, if any.
pub fn matching_rule(
    location: &str,
    payload: &Payload,
    rules: &[LocationRule],
) -> Option<LocationRule> {
    if location.trim().is_empty() {
        return None;
    }
    rules.iter().copied().find(|rule| rule.matches(location, payload))
}

pub fn is_malicious_location(location: &str, payload: &Payload) -> bool {
    matching_rule(location, payload, &LocationRule::ALL).is_some()
}

/// Permissive fallback for targets that echo a mangled payload.
pub fn is_similar_redirect(location: &str, payload: &Payload) -> bool {
    let raw = payload.as_str();
    if raw.is_empty() {
        return false;
    }

    if let Some(authority) = payload.authority() {
        if location.contains(authority) {
            return true;
        }
    }

    if let Some(stripped) = raw.strip_prefix("//") {
        if !stripped.is_empty() && location.contains(stripped) {
            return true;
        }
    }

    if fully_decode(location).contains(raw) {
        return true;
    }

    let without_scheme = raw.replace("http://", "").replace("https://", "");
    !without_scheme.is_empty() && location.contains(&without_scheme)
}

/// Redirect targets declared by `<meta http-equiv="refresh">` tags.
pub fn meta_refresh_targets(body: &str) -> Vec<String> {
    META_TAG
        .find_iter(body)
        .filter(|tag| HTTP_EQUIV_REFRESH.is_match(tag.as_str()))
        .filter_map(|tag| {
            let caps = CONTENT_ATTR.captures(tag.as_str())?;
            let content = caps.get(1).or(caps.get(2)).or(caps.get(3))?.as_str();
            let target = REFRESH_CONTENT.captures(content)?.get(1)?.as_str();
            let target = target.trim().trim_matches(|c| c == '\'' || c == '"').trim();
            if target.is_empty() {
                None
            } else {
                Some(target.to_string())
            }
        })
        .collect()
}

/// URLs passed to script navigation idioms, with the idiom name.
pub fn script_navigation_targets(body: &str) -> Vec<(String, &'static str)> {
    let mut targets = Vec::new();
    for (pattern, idiom) in SCRIPT_NAVIGATION.iter() {
        for caps in pattern.captures_iter(body) {
            if let Some(url) = caps.get(1) {
                targets.push((url.as_str().to_string(), *idiom));
            }
        }
    }
    targets
}

pub struct ResponseClassifier;

impl ResponseClassifier {
    /// Runs the header, meta-refresh and script channels in order; the
    /// first positive channel decides the outcome.
    pub fn classify(response: &HttpInner, payload: &Payload) -> ProbeOutcome {
        if let Some(outcome) = Self::check_header(response, payload) {
            return outcome;
        }
        if response.status() != 200 {
            return ProbeOutcome::NotVulnerable;
        }
        if let Some(outcome) = Self::check_meta_refresh(response.body(), payload) {
            return outcome;
        }
        if let Some(outcome) = Self::check_script(response.body(), payload) {
            return outcome;
        }
        ProbeOutcome::NotVulnerable
    }

    pub fn check_header(response: &HttpInner, payload: &Payload) -> Option<ProbeOutcome> {
        if !response.is_redirect() {
            return None;
        }
        let location = response.location()?;
        let rule = matching_rule(&location, payload, &LocationRule::ALL)?;
        debug!(
            "Location {} matched rule {} for payload {}",
            location,
            rule.name(),
            payload
        );
        Some(ProbeOutcome::VulnerableByHeader { location })
    }

    pub fn check_meta_refresh(body: &str, payload: &Payload) -> Option<ProbeOutcome> {
        meta_refresh_targets(body)
            .into_iter()
            .find(|target| is_malicious_location(target, payload))
            .map(|target| {
                debug!("Meta refresh to {} matched payload {}", target, payload);
                ProbeOutcome::VulnerableByMetaRefresh { target }
            })
    }

    pub fn check_script(body: &str, payload: &Payload) -> Option<ProbeOutcome> {
        for (target, idiom) in script_navigation_targets(body) {
            trace!("Script navigation via {} to {}", idiom, target);
            if is_malicious_location(&target, payload) {
                debug!("{} to {} matched payload {}", idiom, target, payload);
                return Some(ProbeOutcome::VulnerableByScript { target });
            }
        }
        None
    }

    /// Whether a confirmation response still redirects to the payload's
    /// marker. Payloads without a marker need their literal text in the
    /// decoded location.
    pub fn confirms_redirect(response: &HttpInner, payload: &Payload) -> bool {
        if !response.is_redirect() {
            return false;
        }
        let Some(location) = response.location() else {
            return false;
        };
        if payload.marker().is_some() {
            matching_rule(&location, payload, &LocationRule::STRICT).is_some()
        } else {
            fully_decode(&location).contains(payload.as_str())
        }
    }
}
