// File: cli.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use clap::Parser;
use std::path::PathBuf;

use crate::config::{random_user_agent, ConfigParameter};

#[derive(Parser, Debug)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = env!("CARGO_PKG_DESCRIPTION"),
)]
pub struct Cli {
    #[arg(
        short = 'l',
        long = "list",
        help = "File with target domains or URLs, one per line (default: stdin)"
    )]
    pub list: Option<PathBuf>,

    #[arg(
        short = 't',
        long = "threads",
        default_value_t = 10,
        help = "Maximum number of concurrent requests"
    )]
    pub threads: usize,

    #[arg(
        long = "timeout",
        default_value_t = 15,
        help = "HTTP request timeout in seconds"
    )]
    pub timeout: u64,

    #[arg(
        short = 'r',
        long = "rate-limit",
        default_value_t = 0,
        help = "Requests per second (0 = unlimited)"
    )]
    pub rate_limit: u32,

    #[arg(long = "proxy", help = "Proxy URL, e.g. http://127.0.0.1:8080")]
    pub proxy: Option<String>,

    #[arg(
        long = "proxy-file",
        conflicts_with = "proxy",
        help = "File of HTTP/SOCKS proxies; working ones are kept and one is picked at random"
    )]
    pub proxy_file: Option<PathBuf>,

    #[arg(
        long = "user-agent",
        help = "Fixed User-Agent (default: random browser User-Agent per run)"
    )]
    pub user_agent: Option<String>,

    #[arg(
        short = 'o',
        long = "output",
        default_value = "results.json",
        help = "JSON report path"
    )]
    pub output: PathBuf,

    #[arg(long = "html", help = "Also write an HTML report to this path")]
    pub html: Option<PathBuf>,

    #[arg(
        long = "resume-file",
        help = "Persist tested URLs here and skip them on the next run"
    )]
    pub resume_file: Option<PathBuf>,

    #[arg(long = "wayback", help = "Also discover URLs from the Wayback Machine")]
    pub wayback: bool,

    #[arg(
        long = "no-confirm",
        help = "Report header redirects without a confirming second request"
    )]
    pub no_confirm: bool,

    #[arg(long = "no-progress", help = "Disable the progress bar")]
    pub no_progress: bool,

    #[arg(long = "log-level", default_value = "warn")]
    pub log_level: String,

    #[arg(short = 'v', long = "verbose", help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long = "no-color", help = "Disable colored output")]
    pub no_color: bool,
}

impl Cli {
    pub fn get_log_level(&self) -> log::LevelFilter {
        if self.verbose {
            return log::LevelFilter::Debug;
        }
        match self.log_level.to_lowercase().as_str() {
            "off" => log::LevelFilter::Off,
            "error" => log::LevelFilter::Error,
            "info" => log::LevelFilter::Info,
            "debug" => log::LevelFilter::Debug,
            "trace" => log::LevelFilter::Trace,
            _ => log::LevelFilter::Warn,
        }
    }

    pub fn to_config(&self) -> ConfigParameter {
        let mut config = ConfigParameter::new();
        config.set_concurrency(self.threads);
        config.set_timeout(self.timeout);
        config.set_rate_limit(self.rate_limit);
        config.set_proxy(self.proxy.clone());
        config.set_user_agent(
            self.user_agent
                .clone()
                .unwrap_or_else(|| random_user_agent().to_string()),
        );
        config.set_confirm_redirects(!self.no_confirm);
        config.set_show_progress(!self.no_progress);
        config
    }
}
