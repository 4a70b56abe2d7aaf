// File: lib.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::new_without_default)]
#![allow(clippy::useless_vec)]

pub mod catalog;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod errors;
pub mod executor;
pub mod getstate;
pub mod http;
pub mod httpinner;
pub mod injector;
pub mod payloads;
pub mod probe;
pub mod proxies;
pub mod report;
pub mod scanner;
pub mod tested;


pub use catalog::{Payload, PayloadCatalog};
pub use config::ConfigParameter;
pub use errors::{ScanError, ScanResult};
pub use probe::{DetectionChannel, Finding, ProbeOutcome};
pub use scanner::{RedirectScanner, ScanReport, ScanStatus};
