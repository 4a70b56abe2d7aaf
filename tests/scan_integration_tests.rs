// File: scan_integration_tests.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2025
// - Volker Schwaberow <volker@schwaberow.de>

mod common;

use common::*;
use pretty_assertions::assert_eq;
use redirprobe::errors::ScanError;
use redirprobe::probe::DetectionChannel;
use redirprobe::scanner::{RedirectScanner, ScanStatus};
use redirprobe::tested::TestedSet;
use serial_test::serial;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
#[serial]
async fn test_header_redirect_is_reported() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/login"))
        .and(query_param("next", "https://evil.com"))
        .respond_with(create_redirect_response(302, "https://evil.com"))
        .expect(2)
        .mount(&mock_server)
        .await;

    let scanner =
        RedirectScanner::new(test_config(4), catalog_of(&["https://evil.com"])).unwrap();
    let url = format!("{}/login?next=/home", mock_server.uri());
    let report = scanner.scan([url.as_str()]).await;

    assert_eq!(report.status(), ScanStatus::Completed);
    assert_eq!(report.findings().len(), 1);
    let finding = &report.findings()[0];
    assert_eq!(finding.url, url);
    assert_eq!(finding.param, "next");
    assert_eq!(finding.payload, "https://evil.com");
    assert_eq!(finding.status, 302);
    assert_eq!(finding.redirect_location, "https://evil.com");
    assert_eq!(finding.original_value, "/home");
    assert_eq!(finding.channel, DetectionChannel::Header);
    assert!(finding.vulnerable);
}

#[tokio::test]
#[serial]
async fn test_protocol_relative_redirect() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/r"))
        .and(query_param("url", "//evil.com"))
        .respond_with(create_redirect_response(301, "//evil.com"))
        .mount(&mock_server)
        .await;

    let scanner = RedirectScanner::new(test_config(4), catalog_of(&["//evil.com"])).unwrap();
    let report = scanner
        .scan([format!("{}/r?url=/start", mock_server.uri())])
        .await;

    assert_eq!(report.findings().len(), 1);
    assert_eq!(report.findings()[0].status, 301);
    assert_eq!(report.findings()[0].redirect_location, "//evil.com");
}

#[tokio::test]
#[serial]
async fn test_unrelated_parameter_sends_nothing() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let scanner =
        RedirectScanner::new(test_config(4), catalog_of(&["https://evil.com"])).unwrap();
    let report = scanner
        .scan([format!("{}/page?foo=bar", mock_server.uri())])
        .await;

    assert_eq!(report.probes_planned(), 0);
    assert!(report.findings().is_empty());
    assert_eq!(report.status(), ScanStatus::Completed);
}

#[tokio::test]
#[serial]
async fn test_meta_refresh_needs_no_confirmation() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/go"))
        .respond_with(create_html_response(&meta_refresh_page("https://evil.com")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let scanner =
        RedirectScanner::new(test_config(4), catalog_of(&["https://evil.com"])).unwrap();
    let report = scanner
        .scan([format!("{}/go?redirect=/home", mock_server.uri())])
        .await;

    assert_eq!(report.findings().len(), 1);
    assert_eq!(report.findings()[0].channel, DetectionChannel::MetaRefresh);
    assert_eq!(report.findings()[0].status, 200);
    assert_eq!(report.findings()[0].redirect_location, "https://evil.com");
}

#[tokio::test]
#[serial]
async fn test_script_navigation_is_reported() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/js"))
        .respond_with(create_html_response(
            r#"<script>window.location.href = "https://evil.com/landing";</script>"#,
        ))
        .mount(&mock_server)
        .await;

    let scanner =
        RedirectScanner::new(test_config(4), catalog_of(&["https://evil.com"])).unwrap();
    let report = scanner
        .scan([format!("{}/js?return=/", mock_server.uri())])
        .await;

    assert_eq!(report.findings().len(), 1);
    assert_eq!(report.findings()[0].channel, DetectionChannel::Script);
}

#[tokio::test]
#[serial]
async fn test_timeout_yields_no_finding() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("GET"))
        .respond_with(
            create_redirect_response(302, "https://evil.com").set_delay(Duration::from_secs(2)),
        )
        .mount(&mock_server)
        .await;

    let mut config = test_config(4);
    config.set_timeout_duration(Duration::from_millis(200));
    let scanner = RedirectScanner::new(config, catalog_of(&["https://evil.com"])).unwrap();
    let report = scanner
        .scan([format!("{}/login?next=/home", mock_server.uri())])
        .await;

    assert!(report.findings().is_empty());
    assert_eq!(report.probes_completed(), 1);
    assert_eq!(report.probes_errored(), 1);
    assert_eq!(report.status(), ScanStatus::Completed);
}

#[tokio::test]
#[serial]
async fn test_unconfirmed_redirect_is_dropped() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(create_redirect_response(302, "https://evil.com"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(create_redirect_response(302, "/home"))
        .with_priority(2)
        .mount(&mock_server)
        .await;

    let scanner =
        RedirectScanner::new(test_config(1), catalog_of(&["https://evil.com"])).unwrap();
    let report = scanner
        .scan([format!("{}/flaky?next=/home", mock_server.uri())])
        .await;

    assert!(report.findings().is_empty());
    assert_eq!(report.probes_completed(), 1);
    assert_eq!(scanner.state().requests_sent(), 2);
}

#[tokio::test]
#[serial]
async fn test_without_confirmation_single_redirect_is_reported() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(create_redirect_response(302, "https://evil.com"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = test_config(1);
    config.set_confirm_redirects(false);
    let scanner = RedirectScanner::new(config, catalog_of(&["https://evil.com"])).unwrap();
    let report = scanner
        .scan([format!("{}/flaky?next=/home", mock_server.uri())])
        .await;

    assert_eq!(report.findings().len(), 1);
}

#[tokio::test]
#[serial]
async fn test_urls_are_tested_once() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(2)
        .mount(&mock_server)
        .await;

    let scanner = RedirectScanner::new(
        test_config(4),
        catalog_of(&["https://evil.com", "//evil.com"]),
    )
    .unwrap();
    let url = format!("{}/login?next=/home", mock_server.uri());

    let first = scanner.scan([url.as_str(), url.as_str()]).await;
    assert_eq!(first.probes_planned(), 2);

    let second = scanner.scan([url.as_str()]).await;
    assert_eq!(second.probes_planned(), 0);
    assert!(scanner.tested().contains(&url));
}

#[tokio::test]
#[serial]
async fn test_resumed_urls_are_skipped() {
    let url = "https://shop.test/login?next=/home".to_string();
    let fetch = Arc::new(FakeFetch::new(Duration::ZERO, reflecting("next")));
    let tested: TestedSet = vec![url.clone()].into_iter().collect();

    let scanner = RedirectScanner::with_fetcher(
        test_config(2),
        catalog_of(&["https://evil.com"]),
        fetch.clone(),
    )
    .unwrap()
    .with_tested_set(Arc::new(tested));
    let report = scanner.scan([url.as_str()]).await;

    assert_eq!(report.probes_planned(), 0);
    assert_eq!(fetch.calls(), 0);
}

#[tokio::test]
#[serial]
async fn test_concurrency_limit_is_respected() {
    let fetch = Arc::new(FakeFetch::new(Duration::from_millis(30), |url: &str| {
        Ok(ok_inner("nothing here", url))
    }));
    let payloads: Vec<String> = (0..10).map(|i| format!("https://evil{}.com", i)).collect();
    let payload_refs: Vec<&str> = payloads.iter().map(String::as_str).collect();

    let scanner =
        RedirectScanner::with_fetcher(test_config(3), catalog_of(&payload_refs), fetch.clone())
            .unwrap();
    let report = scanner
        .scan(["https://shop.test/a?next=/x&url=/y"])
        .await;

    assert_eq!(report.probes_planned(), 20);
    assert_eq!(report.probes_completed(), 20);
    assert_eq!(fetch.calls(), 20);
    assert!(fetch.max_in_flight() <= 3);
    assert!(fetch.max_in_flight() >= 1);
}

#[tokio::test]
#[serial]
async fn test_every_reflected_payload_is_found() {
    let fetch = Arc::new(FakeFetch::new(Duration::from_millis(5), reflecting("next")));
    let scanner = RedirectScanner::with_fetcher(
        test_config(4),
        catalog_of(&["https://evil.com", "//evil.com", "https:evil.com", "javascript:alert(1)"]),
        fetch.clone(),
    )
    .unwrap();
    let report = scanner.scan(["https://shop.test/login?next=/"]).await;

    let mut payloads: Vec<&str> = report.findings().iter().map(|f| f.payload.as_str()).collect();
    payloads.sort();
    assert!(payloads.contains(&"https://evil.com"));
    assert!(payloads.contains(&"//evil.com"));
    assert_eq!(scanner.state().findings() as usize, report.findings().len());
}

#[tokio::test]
#[serial]
async fn test_transport_errors_are_contained() {
    let fetch = Arc::new(FakeFetch::new(Duration::ZERO, |_url: &str| {
        Err(ScanError::Transport("connection refused".to_string()))
    }));
    let scanner = RedirectScanner::with_fetcher(
        test_config(2),
        catalog_of(&["https://evil.com", "//evil.com"]),
        fetch,
    )
    .unwrap();
    let report = scanner.scan(["https://down.test/?next=/"]).await;

    assert!(report.findings().is_empty());
    assert_eq!(report.probes_errored(), 2);
    assert_eq!(report.status(), ScanStatus::Completed);
}

#[tokio::test]
#[serial]
async fn test_cancellation_keeps_partial_findings() {
    let fetch = Arc::new(FakeFetch::new(Duration::from_millis(100), reflecting("next")));
    let payloads: Vec<String> = (0..10).map(|i| format!("https://evil{}.com", i)).collect();
    let payload_refs: Vec<&str> = payloads.iter().map(String::as_str).collect();

    let mut config = test_config(1);
    config.set_confirm_redirects(false);
    config.set_timeout_duration(Duration::from_secs(1));
    let scanner =
        RedirectScanner::with_fetcher(config, catalog_of(&payload_refs), fetch.clone()).unwrap();

    let report = scanner
        .scan_until(
            ["https://shop.test/login?next=/"],
            tokio::time::sleep(Duration::from_millis(250)),
        )
        .await;

    assert_eq!(report.status(), ScanStatus::Cancelled);
    assert!(report.is_cancelled());
    assert!(!report.findings().is_empty());
    assert!(report.findings().len() < 10);
    assert_eq!(report.findings().len(), report.probes_completed());
    assert!(fetch.calls() < 10);
}

#[tokio::test]
#[serial]
async fn test_cancellation_aborts_slow_probes_after_grace() {
    let fetch = Arc::new(FakeFetch::new(Duration::from_secs(5), reflecting("next")));
    let mut config = test_config(2);
    config.set_timeout_duration(Duration::from_millis(50));
    let scanner =
        RedirectScanner::with_fetcher(config, catalog_of(&["https://evil.com"]), fetch).unwrap();

    let started = std::time::Instant::now();
    let report = scanner
        .scan_until(
            ["https://shop.test/login?next=/"],
            tokio::time::sleep(Duration::from_millis(50)),
        )
        .await;

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(report.status(), ScanStatus::Cancelled);
    assert!(report.findings().is_empty());
    assert_eq!(report.probes_completed(), 0);
}

#[test]
fn test_invalid_configuration_is_rejected() {
    let config = test_config(0);
    let result = RedirectScanner::new(config, catalog_of(&["https://evil.com"]));
    assert!(matches!(result, Err(ScanError::Configuration(_))));

    let mut config = test_config(2);
    config.set_proxy(Some(String::new()));
    let result = RedirectScanner::new(config, catalog_of(&["https://evil.com"]));
    assert!(matches!(result, Err(ScanError::Configuration(_))));
}

#[tokio::test]
#[serial]
async fn test_site_login_next_redirect() {
    let fetch = Arc::new(FakeFetch::new(Duration::ZERO, |url: &str| {
        if url.starts_with("https://site.test/login?next=http%3A%2F%2Fevil.com") {
            Ok(redirect_inner(302, "http://evil.com", url))
        } else {
            Ok(ok_inner("", url))
        }
    }));
    let scanner = RedirectScanner::with_fetcher(
        test_config(2),
        catalog_of(&["http://evil.com"]),
        fetch.clone(),
    )
    .unwrap();
    let report = scanner.scan(["https://site.test/login?next=/account"]).await;

    assert_eq!(report.findings().len(), 1);
    assert_eq!(report.findings()[0].payload, "http://evil.com");
    assert_eq!(report.findings()[0].channel, DetectionChannel::Header);
    assert_eq!(report.findings()[0].original_value, "/account");
    assert_eq!(fetch.calls(), 2);
}

#[tokio::test]
#[serial]
async fn test_cancelled_scan_keeps_only_fetched_urls_tested() {
    let fetch = Arc::new(FakeFetch::new(Duration::from_millis(200), |url: &str| {
        Ok(ok_inner("", url))
    }));
    let scanner = RedirectScanner::with_fetcher(
        test_config(1),
        catalog_of(&["https://evil.com"]),
        fetch.clone(),
    )
    .unwrap();

    let report = scanner
        .scan_until(
            [
                "https://a.test/?next=/",
                "https://b.test/?next=/",
                "https://c.test/?next=/",
            ],
            tokio::time::sleep(Duration::from_millis(50)),
        )
        .await;

    assert_eq!(report.status(), ScanStatus::Cancelled);
    assert_eq!(fetch.calls(), 1);
    assert_eq!(
        scanner.tested().snapshot(),
        vec!["https://a.test/?next=/".to_string()]
    );

    let resumed = scanner.scan(["https://b.test/?next=/"]).await;
    assert_eq!(resumed.status(), ScanStatus::Completed);
    assert_eq!(fetch.calls(), 2);
}
