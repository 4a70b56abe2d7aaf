// File: report.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025
// - Volker Schwaberow <volker@schwaberow.de>

use crate::getstate::GetState;
use crate::probe::Finding;
use crate::scanner::{ScanReport, ScanStatus};
use anyhow::{Context, Result};
use chrono::Utc;
use colored::*;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

pub const NO_URLS_MESSAGE: &str = "No URLs with redirect parameters discovered.";
pub const NO_FINDINGS_MESSAGE: &str = "No open redirect vulnerabilities found.";

pub struct ReportGenerator;

impl ReportGenerator {
    pub fn generate_json_report(findings: &[Finding], output_path: &Path) -> Result<()> {
        let json =
            serde_json::to_string_pretty(findings).context("Failed to serialize findings")?;
        let mut file = create_file(output_path)?;
        writeln!(file, "{}", json)
            .with_context(|| format!("Failed to write {}", output_path.display()))?;
        Ok(())
    }

    pub fn generate_html_report(findings: &[Finding], output_path: &Path) -> Result<()> {
        let html = Self::render_html(findings);
        let mut file = create_file(output_path)?;
        file.write_all(html.as_bytes())
            .with_context(|| format!("Failed to write {}", output_path.display()))?;
        Ok(())
    }

    pub fn render_html(findings: &[Finding]) -> String {
        let body = if findings.is_empty() {
            format!("<p class=\"empty\">{}</p>", NO_FINDINGS_MESSAGE)
        } else {
            let rows: String = findings
                .iter()
                .map(|f| {
                    format!(
                        "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                        escape_html(&f.url),
                        escape_html(&f.param),
                        escape_html(&f.payload),
                        f.status,
                        f.channel,
                        escape_html(&f.redirect_location)
                    )
                })
                .collect();
            format!(
                "<table>\n<tr><th>URL</th><th>Parameter</th><th>Payload</th><th>Status</th><th>Channel</th><th>Redirect</th></tr>\n{}</table>",
                rows
            )
        };

        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Open Redirect Report</title>
<style>
body {{ font-family: sans-serif; margin: 2em; }}
table {{ border-collapse: collapse; width: 100%; }}
th, td {{ border: 1px solid #ccc; padding: 4px 8px; text-align: left; word-break: break-all; }}
th {{ background: #f3f3f3; }}
.empty {{ color: #2e7d32; }}
</style>
</head>
<body>
<h1>Open Redirect Report</h1>
<p>Generated on {} by {} v{} | {} findings</p>
{}
</body>
</html>
"#,
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            findings.len(),
            body
        )
    }

    pub fn print_no_urls() {
        println!("{} {}", "⚠".yellow().bold(), NO_URLS_MESSAGE);
    }

    pub fn print_terminal_report(report: &ScanReport) {
        if report.status() == ScanStatus::Cancelled {
            println!(
                "{} Scan interrupted, showing partial results",
                "⚠".yellow().bold()
            );
        }

        if report.findings().is_empty() {
            println!("{} {}", "✓".green().bold(), NO_FINDINGS_MESSAGE);
            return;
        }

        println!(
            "{} {} open redirect(s) found:",
            "✗".red().bold(),
            report.findings().len()
        );
        for finding in report.findings() {
            println!(
                "  {} {} [{}={}]",
                format!("[{}]", finding.channel).red(),
                finding.url.bold(),
                finding.param.cyan(),
                finding.payload
            );
            println!(
                "      {} {} -> {}",
                finding.status.to_string().yellow(),
                "redirects".dimmed(),
                finding.redirect_location
            );
        }
    }

    pub fn print_statistics(state: &GetState) {
        println!();
        println!("{}", state.summary().dimmed());
    }
}

fn create_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    File::create(path).with_context(|| format!("Failed to create {}", path.display()))
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
