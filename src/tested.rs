// File: tested.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use crate::errors::ScanResult;
use log::{debug, info};
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Mutex;

/// URLs already dispatched for probing. Shared across `scan` calls of one
/// scanner, and persisted as a JSON array of URLs for resumed runs.
#[derive(Debug, Default)]
pub struct TestedSet {
    urls: Mutex<HashSet<String>>,
}

impl TestedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically records `url`; returns false if it was already present.
    pub fn insert(&self, url: &str) -> bool {
        match self.urls.lock() {
            Ok(mut urls) => urls.insert(url.to_string()),
            Err(poisoned) => poisoned.into_inner().insert(url.to_string()),
        }
    }

    /// Forgets `url`; returns false if it was not present.
    pub fn remove(&self, url: &str) -> bool {
        match self.urls.lock() {
            Ok(mut urls) => urls.remove(url),
            Err(poisoned) => poisoned.into_inner().remove(url),
        }
    }

    pub fn contains(&self, url: &str) -> bool {
        match self.urls.lock() {
            Ok(urls) => urls.contains(url),
            Err(poisoned) => poisoned.into_inner().contains(url),
        }
    }

    pub fn len(&self) -> usize {
        match self.urls.lock() {
            Ok(urls) => urls.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted copy of the set.
    pub fn snapshot(&self) -> Vec<String> {
        let urls = match self.urls.lock() {
            Ok(urls) => urls.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        urls.into_iter().collect::<BTreeSet<_>>().into_iter().collect()
    }

    /// Loads a saved set. A missing file is an empty set.
    pub fn load(path: &Path) -> ScanResult<Self> {
        if !path.exists() {
            debug!("No resume state at {}", path.display());
            return Ok(Self::new());
        }
        let content = fs::read_to_string(path)?;
        let urls: Vec<String> = if content.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&content)?
        };
        info!("Loaded {} tested URLs from {}", urls.len(), path.display());
        Ok(Self {
            urls: Mutex::new(urls.into_iter().collect()),
        })
    }

    pub fn save(&self, path: &Path) -> ScanResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&self.snapshot())?;
        fs::write(path, json)?;
        debug!("Saved {} tested URLs to {}", self.len(), path.display());
        Ok(())
    }
}

impl FromIterator<String> for TestedSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            urls: Mutex::new(iter.into_iter().collect()),
        }
    }
}
