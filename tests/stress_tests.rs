//! Stress tests for large output passes
//!
//! These tests verify:
//! - Header routes degrade to a warning instead of sending oversized payloads
//! - FirePHP stops at its message cap
//! - Channel filtering holds up across many channels
//! - Deep unclosed group nesting is closed by the output pass
//! - Many sequential requests on worker threads

use debug_console::prelude::*;
use debug_console::routes::{ServerLogConfig, TextConfig, FIREPHP_MESSAGE_LIMIT, SERVER_LOG_HEADER};
use serde_json::Value as Json;
use std::thread;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

/// ChromeLogger drops the header and reports why
#[test]
fn test_chrome_logger_output_limit() {
    let mut console = Console::builder().route(ChromeLoggerRoute::default()).build();
    for i in 0..100_000 {
        console.log(args!["row", i]);
    }

    let output = console.output();
    assert!(output.header(CHROME_LOGGER_HEADER).is_none());

    let log = console.store().log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].method, Method::Warn);
    assert_eq!(log[0].first_arg_text(), "chromeLogger: output limit exceeded");
}

/// FirePHP sends at most the cap, then a final warning message
#[test]
fn test_firephp_message_cap() {
    let mut console = Console::builder().route(FirePhpRoute::default()).build();
    for i in 0..(FIREPHP_MESSAGE_LIMIT + 50) {
        console.log(args![i]);
    }

    let output = console.output();
    let last = FIREPHP_MESSAGE_LIMIT + 1;
    assert_eq!(output.header("X-Wf-1-Index"), Some(last.to_string().as_str()));

    let warning = output.header(&format!("X-Wf-1-1-1-{}", last)).unwrap();
    assert!(warning.contains("FirePhp's limit of 99,999 messages reached!"));
    assert!(warning.contains(r#""Type":"WARN""#));
    assert!(output.header(&format!("X-Wf-1-1-1-{}", last + 1)).is_none());
}

/// Only the selected channels reach the route
#[test]
fn test_many_channels() {
    let text = TextRoute::new(
        TextConfig::default().with_route(
            RouteConfig::default()
                .with_channels(["general.worker*"])
                .with_channels_exclude(["general.worker.7*"]),
        ),
    );
    let mut console = Console::builder().route(text).build();

    for worker in 0..100 {
        for job in 0..20 {
            console.channel(&format!("worker.{}", worker)).log(args!["job", job]);
        }
        console.channel(&format!("db.{}", worker)).log(args!["query"]);
    }

    let body = console.output().body;
    // workers 7 and 70..=79 are excluded
    assert_eq!(body.lines().count(), (100 - 11) * 20);
    assert!(!body.contains("query"));
}

/// Unclosed groups are closed before rendering, however deep
#[test]
fn test_deep_group_nesting() {
    let mut console = Console::builder()
        .route(TextRoute::default())
        .route(ChromeLoggerRoute::default())
        .build();
    for depth in 0..500 {
        console.group(args!["depth", depth]);
    }
    console.log(args!["bottom"]);

    let output = console.output();
    let last = output.body.lines().last().unwrap();
    assert_eq!(last, format!("{}bottom", "    ".repeat(500)));

    let header = output.header(CHROME_LOGGER_HEADER).unwrap();
    let bytes = base64_decode(header);
    let doc: Json = serde_json::from_slice(&bytes).unwrap();
    let group_ends = doc["rows"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|row| row[2] == "groupEnd")
        .count();
    // 500 closed by the pass, one for the request heading
    assert_eq!(group_ends, 501);
    assert!(console.store().is_empty());
}

fn base64_decode(value: &str) -> Vec<u8> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.decode(value).unwrap()
}

/// Independent consoles on worker threads, one per simulated request
#[test]
fn test_concurrent_requests() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_dir = temp_dir.path().to_path_buf();

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let log_dir = log_dir.clone();
            thread::spawn(move || {
                let mut urls = Vec::new();
                for request in 0..25 {
                    let mut console = Console::builder()
                        .environment(
                            StaticEnvironment::http("GET", format!("/jobs/{}", request))
                                .with_request_id(format!("w{}r{}", worker, request)),
                        )
                        .route(ServerLogRoute::new(
                            ServerLogConfig::new(&log_dir).with_gc(0.0, 60),
                        ))
                        .route(HtmlRoute::default())
                        .build();
                    for i in 0..50 {
                        console.info(args!["step", i]);
                    }
                    let output = console.output();
                    assert!(output.body.contains("step"));
                    urls.push(output.header(SERVER_LOG_HEADER).unwrap().to_string());
                    assert_eq!(console.metrics().routes_failed(), 0);
                }
                urls
            })
        })
        .collect();

    let mut total = 0;
    for handle in handles {
        total += handle.join().expect("Thread panicked").len();
    }
    assert_eq!(total, 200);
    assert_eq!(std::fs::read_dir(&log_dir).unwrap().count(), 200);

    // everything is older than the lifetime an hour from now
    let route = ServerLogRoute::new(ServerLogConfig::new(&log_dir).with_gc(0.0, 60));
    let removed = route
        .collect_garbage(SystemTime::now() + Duration::from_secs(3600))
        .unwrap();
    assert_eq!(removed, 200);
}
