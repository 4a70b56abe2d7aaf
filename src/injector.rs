// File: injector.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

//! Query string rewriting. Only the value of the targeted parameter is
//! touched; every other byte of the URL is kept as it was written.

use crate::errors::{ScanError, ScanResult};
use url::form_urlencoded;
use url::Url;

/// Ordered, de-duplicated (name, first value) pairs of a URL's query.
pub fn query_params(url: &Url) -> Vec<(String, String)> {
    let mut seen = std::collections::HashSet::new();
    url.query_pairs()
        .filter(|(name, _)| seen.insert(name.to_string()))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect()
}

/// First decoded value of `param` in `url`.
pub fn query_value(url: &str, param: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(name, _)| name == param)
        .map(|(_, value)| value.into_owned())
}

fn encode_component(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

fn decode_component(raw: &str) -> String {
    form_urlencoded::parse(format!("{}=", raw).as_bytes())
        .next()
        .map(|(name, _)| name.into_owned())
        .unwrap_or_default()
}

/// Replaces every value of `param` with `payload`. The payload is form
/// encoded, so parsing the result and reading `param` yields `payload`.
pub fn inject_payload(url: &str, param: &str, payload: &str) -> ScanResult<String> {
    let parsed = Url::parse(url)?;
    if parsed.cannot_be_a_base() {
        return Err(ScanError::InvalidUrl(url.to_string()));
    }

    let (before_fragment, fragment) = match url.find('#') {
        Some(idx) => (&url[..idx], Some(&url[idx..])),
        None => (url, None),
    };
    let (base, query) = match before_fragment.find('?') {
        Some(idx) => (&before_fragment[..idx], &before_fragment[idx + 1..]),
        None => (before_fragment, ""),
    };

    let encoded = encode_component(payload);
    let mut replaced = false;
    let pairs: Vec<String> = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let name = pair.split('=').next().unwrap_or(pair);
            if decode_component(name) == param {
                replaced = true;
                format!("{}={}", name, encoded)
            } else {
                pair.to_string()
            }
        })
        .collect();

    if !replaced {
        return Err(ScanError::InvalidUrl(format!(
            "{} has no parameter named {}",
            url, param
        )));
    }

    let mut injected = format!("{}?{}", base, pairs.join("&"));
    if let Some(fragment) = fragment {
        injected.push_str(fragment);
    }
    Ok(injected)
}
