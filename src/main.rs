/*
Copyright 2022 Volker Schwaberow <volker@schwaberow.de>
Permission is hereby granted, free of charge, to any person obtaining a
copy of this software and associated documentation files (the
"Software"), to deal in the Software without restriction, including without
limitation the rights to use, copy, modify, merge, publish, distribute,
sublicense, and/or sell copies of the Software, and to permit persons to whom the
Software is furnished to do so, subject to the following conditions:
The above copyright notice and this permission notice shall be
included in all copies or substantial portions of the Software.
THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS
OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT
SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR
OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE,
ARISING FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
DEALINGS IN THE SOFTWARE.
Author(s): Volker Schwaberow
*/

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use redirprobe::catalog::PayloadCatalog;
use redirprobe::cli::Cli;
use redirprobe::discovery::{UrlDiscovery, WAYBACK_ENDPOINT};
use redirprobe::http::{Fetch, HttpFetcher};
use redirprobe::proxies::{choose_proxy, load_proxies, validate_proxies, PROXY_CHECK_URL};
use redirprobe::report::ReportGenerator;
use redirprobe::scanner::RedirectScanner;
use redirprobe::tested::TestedSet;
use std::collections::BTreeSet;
use std::fs;
use std::io::{self, BufRead};
use std::sync::Arc;

fn read_targets(cli: &Cli) -> Result<Vec<String>> {
    let lines: Vec<String> = match &cli.list {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read target list {}", path.display()))?
            .lines()
            .map(str::to_string)
            .collect(),
        None => io::stdin()
            .lock()
            .lines()
            .collect::<io::Result<_>>()
            .context("Failed to read targets from stdin")?,
    };
    Ok(lines
        .into_iter()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect())
}

async fn wait_for_interrupt() {
    if tokio::signal::ctrl_c().await.is_err() {
        warn!("Unable to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }
    simple_logger::SimpleLogger::new()
        .with_level(cli.get_log_level())
        .init()
        .context("Failed to initialize logger")?;

    let targets = read_targets(&cli)?;
    if targets.is_empty() {
        anyhow::bail!("No targets given. Pass --list or pipe targets on stdin.");
    }

    let mut config = cli.to_config();
    if let Some(path) = &cli.proxy_file {
        let proxies = load_proxies(path)
            .with_context(|| format!("Failed to read proxy file {}", path.display()))?;
        if proxies.is_empty() {
            anyhow::bail!("Proxy file {} lists no proxies", path.display());
        }
        let working = validate_proxies(&proxies, PROXY_CHECK_URL, config.timeout()).await;
        let Some(proxy) = choose_proxy(&working) else {
            anyhow::bail!("No working proxies found in {}", path.display());
        };
        info!(
            "Using proxy {} ({} of {} working)",
            proxy,
            working.len(),
            proxies.len()
        );
        config.set_proxy(Some(proxy.to_string()));
    }
    config.validate().context("Invalid configuration")?;
    let catalog = PayloadCatalog::default();
    let fetcher: Arc<dyn Fetch> =
        Arc::new(HttpFetcher::new(&config).context("Failed to build HTTP client")?);

    let mut discovery = UrlDiscovery::new(Arc::clone(&fetcher), catalog.clone());
    if cli.wayback {
        discovery = discovery.with_wayback(WAYBACK_ENDPOINT);
    }
    let mut urls = BTreeSet::new();
    for target in &targets {
        urls.extend(discovery.discover_urls(target).await);
    }
    info!("{} candidate URLs from {} targets", urls.len(), targets.len());

    if urls.is_empty() {
        ReportGenerator::print_no_urls();
        return Ok(());
    }

    let tested = match &cli.resume_file {
        Some(path) => TestedSet::load(path)
            .with_context(|| format!("Failed to load resume file {}", path.display()))?,
        None => TestedSet::new(),
    };
    let scanner = RedirectScanner::with_fetcher(config, catalog, fetcher)
        .context("Invalid configuration")?
        .with_tested_set(Arc::new(tested));

    let report = scanner.scan_until(&urls, wait_for_interrupt()).await;

    if let Some(path) = &cli.resume_file {
        scanner
            .tested()
            .save(path)
            .with_context(|| format!("Failed to save resume file {}", path.display()))?;
    }

    ReportGenerator::generate_json_report(report.findings(), &cli.output)?;
    if let Some(path) = &cli.html {
        ReportGenerator::generate_html_report(report.findings(), path)?;
    }

    ReportGenerator::print_terminal_report(&report);
    ReportGenerator::print_statistics(scanner.state());
    println!("Results saved to {}", cli.output.display());

    Ok(())
}
