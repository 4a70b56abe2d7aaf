// File: errors.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use std::fmt;

#[derive(Debug)]
pub enum ScanError {
    Configuration(String),
    InvalidUrl(String),
    Timeout(String),
    Transport(String),
    Io(std::io::Error),
    Serialization(serde_json::Error),
}

impl ScanError {
    /// Transport-level failures are contained per probe and never abort a scan.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Transport(_))
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            Self::InvalidUrl(url) => write!(f, "Invalid URL: {}", url),
            Self::Timeout(url) => write!(f, "Request timed out: {}", url),
            Self::Transport(msg) => write!(f, "Transport error: {}", msg),
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::Serialization(e) => write!(f, "Serialization error: {}", e),
        }
    }
}

impl std::error::Error for ScanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Serialization(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ScanError {
    fn from(error: reqwest::Error) -> Self {
        let url = error
            .url()
            .map_or_else(|| "Unknown URL".to_string(), |u| u.to_string());
        if error.is_timeout() {
            Self::Timeout(url)
        } else {
            Self::Transport(format!("{}: {}", url, error))
        }
    }
}

impl From<url::ParseError> for ScanError {
    fn from(error: url::ParseError) -> Self {
        Self::InvalidUrl(error.to_string())
    }
}

impl From<std::io::Error> for ScanError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error)
    }
}

impl From<serde_json::Error> for ScanError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error)
    }
}

pub type ScanResult<T> = Result<T, ScanError>;
