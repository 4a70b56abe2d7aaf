// File: probe.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use crate::catalog::Payload;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One (url, parameter, payload) test. Built by the scanner, consumed once.
#[derive(Debug, Clone)]
pub struct Probe {
    pub url: String,
    pub param: String,
    pub original_value: String,
    pub payload: Payload,
}

impl Probe {
    pub fn new(
        url: impl Into<String>,
        param: impl Into<String>,
        original_value: impl Into<String>,
        payload: Payload,
    ) -> Self {
        Self {
            url: url.into(),
            param: param.into(),
            original_value: original_value.into(),
            payload,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionChannel {
    Header,
    MetaRefresh,
    Script,
}

impl fmt::Display for DetectionChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionChannel::Header => write!(f, "header"),
            DetectionChannel::MetaRefresh => write!(f, "meta-refresh"),
            DetectionChannel::Script => write!(f, "script"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    NotVulnerable,
    VulnerableByHeader { location: String },
    VulnerableByMetaRefresh { target: String },
    VulnerableByScript { target: String },
    Errored(String),
}

impl ProbeOutcome {
    pub fn channel(&self) -> Option<DetectionChannel> {
        match self {
            ProbeOutcome::VulnerableByHeader { .. } => Some(DetectionChannel::Header),
            ProbeOutcome::VulnerableByMetaRefresh { .. } => Some(DetectionChannel::MetaRefresh),
            ProbeOutcome::VulnerableByScript { .. } => Some(DetectionChannel::Script),
            _ => None,
        }
    }

    /// The redirect target the response carried, for positive outcomes.
    pub fn observed_target(&self) -> Option<&str> {
        match self {
            ProbeOutcome::VulnerableByHeader { location } => Some(location),
            ProbeOutcome::VulnerableByMetaRefresh { target }
            | ProbeOutcome::VulnerableByScript { target } => Some(target),
            _ => None,
        }
    }

    pub fn is_vulnerable(&self) -> bool {
        self.channel().is_some()
    }
}

/// A confirmed open redirect, in the shape the reports serialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub url: String,
    pub param: String,
    pub payload: String,
    pub status: u16,
    pub redirect_location: String,
    pub original_value: String,
    pub channel: DetectionChannel,
    pub vulnerable: bool,
}

impl Finding {
    /// Returns `None` unless the outcome is a positive detection.
    pub fn from_outcome(probe: &Probe, status: u16, outcome: &ProbeOutcome) -> Option<Self> {
        let channel = outcome.channel()?;
        let redirect_location = outcome.observed_target()?.to_string();
        Some(Self {
            url: probe.url.clone(),
            param: probe.param.clone(),
            payload: probe.payload.as_str().to_string(),
            status,
            redirect_location,
            original_value: probe.original_value.clone(),
            channel,
            vulnerable: true,
        })
    }
}
