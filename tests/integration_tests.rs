//! Integration tests for the debug console
//!
//! These tests verify:
//! - Several routes rendering the same output pass
//! - Interceptors and channel filters applied per route
//! - Route failure isolation
//! - Error notification flow through the throttle
//! - Email serialization restoring a log into a fresh console
//! - Real-time routes (stream file, WAMP over a channel)

use debug_console::core::{
    ConsoleError, ErrorLevel, EventKind, OutputContext, RouteBase, Subscription,
};
use debug_console::prelude::*;
use debug_console::routes::{
    unserialize_log, ChannelPublisher, EmailConfig, EmailErrorRoute, EmailRoute, MemoryMailer,
    MemoryTransport, NotifyConfig, ServerLogConfig, SlackRoute, StreamConfig, TextConfig,
    WampConfig, WampRoute, FIREPHP_CHUNK_SIZE, SERVER_LOG_HEADER,
};
use std::fs;
use tempfile::TempDir;

/// Output route whose pass always fails
struct BrokenRoute {
    base: RouteBase,
}

impl BrokenRoute {
    fn new() -> Self {
        Self {
            base: RouteBase::new("broken", &RouteConfig::default()),
        }
    }
}

impl Route for BrokenRoute {
    fn base(&self) -> &RouteBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RouteBase {
        &mut self.base
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        vec![Subscription::new(EventKind::Output, 100)]
    }

    fn process_log_entries(&mut self, _ctx: &mut OutputContext<'_>) -> Result<()> {
        Err(ConsoleError::writer("disk full"))
    }

    fn process_log_entry(&mut self, _entry: &LogEntry) -> Result<Option<String>> {
        Ok(None)
    }
}

#[test]
fn test_routes_share_one_pass() {
    let mut console = Console::builder()
        .environment(StaticEnvironment::http("GET", "/dashboard"))
        .route(HtmlRoute::default())
        .route(ScriptRoute::default())
        .route(ChromeLoggerRoute::default())
        .route(FirePhpRoute::default())
        .build();

    console.group(args!["load widgets"]);
    console.info(args!["cached", true]);
    console.group_end();
    console.warn(args!["slow widget:", "weather"]);

    let output = console.output();
    assert!(output.body.contains(r#"<div class="debug""#));
    assert!(output.body.contains(r#"<script type="text/javascript">"#));
    assert!(output.body.contains("console.warn("));
    assert!(output.header(CHROME_LOGGER_HEADER).is_some());
    assert_eq!(output.header("X-Wf-1-Index"), Some("6"));

    // store is cleared after the pass
    assert!(console.store().is_empty());
    assert_eq!(console.metrics().passes(), 1);
}

#[test]
fn test_interceptor_applies_per_route() {
    let mut console = Console::builder()
        .route(TextRoute::default())
        .route(HtmlRoute::default())
        .interceptor(FnInterceptor::new(|route: &str, entry: &mut LogEntry| {
            if route == "text" && entry.first_arg_text() == "secret" {
                return Some("[redacted]".to_string());
            }
            None
        }))
        .interceptor(FnInterceptor::new(|_route: &str, entry: &mut LogEntry| {
            if entry.channel_name() == "general.noise" {
                entry.meta.set_output(false);
            }
            None
        }))
        .build();

    console.log(args!["secret"]);
    console.channel("noise").log(args!["chatter"]);
    console.log(args!["visible"]);

    let body = console.output().body;
    assert!(body.contains("[redacted]\nvisible\n"));
    assert!(body.contains(r#"<span class="no-quotes t_string">secret</span>"#));
    assert!(!body.contains("chatter"));
}

#[test]
fn test_channel_filters() {
    let text = TextRoute::new(
        TextConfig::default().with_route(RouteConfig::default().with_channels(["general.db*"])),
    );
    let mut console = Console::builder().route(text).build();

    console.log(args!["root"]);
    console.channel("db").log(args!["select"]);
    console.channel("db.replica").log(args!["replica lag", 3]);

    assert_eq!(console.output().body, "select\nreplica lag = 3\n");
}

#[test]
fn test_failing_route_isolated() {
    let mut console = Console::builder()
        .route(BrokenRoute::new())
        .route(TextRoute::default())
        .build();
    console.log(args!["still here"]);

    let output = console.output();
    assert_eq!(output.body, "still here\n");
    assert_eq!(console.metrics().routes_failed(), 1);
}

#[test]
fn test_output_disabled() {
    let mut console = Console::builder().output(false).route(TextRoute::default()).build();
    console.log(args!["kept"]);

    assert!(console.output().is_empty());
    assert_eq!(console.store().log().len(), 1);

    console.set_output(true);
    assert_eq!(console.output().body, "kept\n");
}

#[test]
fn test_clear_keeps_errors() {
    let mut console = Console::builder().route(TextRoute::default()).build();
    console.log(args!["noise"]);
    console.error(args!["broken"]);
    console.group(args!["open"]);
    console.log(args!["inner"]);
    console.clear();

    let body = console.output().body;
    assert!(!body.contains("noise"));
    assert!(body.contains("⦻ broken"));
    assert!(body.contains("▸ open"));
    assert!(!body.contains("inner"));
    assert!(body.contains("Cleared log (sans errors)"));
}

#[test]
fn test_error_notifications() {
    let transport = MemoryTransport::new();
    let mailer = MemoryMailer::new();
    let mut console = Console::builder()
        .environment(StaticEnvironment::http("GET", "/pay").isolated())
        .route(SlackRoute::new(
            transport.clone(),
            NotifyConfig::default().with_destination("https://hooks.slack.test/x"),
        ))
        .route(EmailErrorRoute::new(
            mailer.clone(),
            NotifyConfig::default().with_destination("ops@example.com"),
        ))
        .route(HtmlRoute::default())
        .build();

    // logged in the console, so nobody is notified
    let mut logged = ErrorEvent::new(ErrorLevel::WARNING, "captured", "/app/a.rs", 1);
    console.handle_error(&mut logged).unwrap();
    assert!(transport.requests().is_empty());

    console.set_collect(false);
    let mut missed = ErrorEvent::new(ErrorLevel::USER_ERROR, "gateway timeout", "/app/pay.rs", 8);
    console.handle_error(&mut missed).unwrap();
    assert_eq!(transport.requests().len(), 1);
    assert_eq!(mailer.sent().len(), 1);

    // same error again in this request
    let mut repeat = ErrorEvent::new(ErrorLevel::USER_ERROR, "gateway timeout", "/app/pay.rs", 8);
    console.handle_error(&mut repeat).unwrap();
    assert!(!repeat.is_first_occur);
    assert_eq!(transport.requests().len(), 1);
    assert_eq!(console.metrics().notifications_sent(), 2);

    assert_eq!(console.errors().not_in_console(), 2);
    let body = console.output().body;
    assert!(body.contains("error-summary"));
    assert!(body.contains("2 errors were not logged in console"));
}

#[test]
fn test_notification_config_error_is_lazy() {
    let mut console = Console::builder()
        .environment(StaticEnvironment::default().isolated())
        .route(SlackRoute::new(MemoryTransport::new(), NotifyConfig::default()))
        .build();

    // masked level: nothing to send, so no configuration error either
    let mut notice = ErrorEvent::new(ErrorLevel::NOTICE, "n", "/app/a.rs", 1);
    assert!(console.handle_error(&mut notice).is_ok());

    console.set_collect(false);
    let mut warning = ErrorEvent::new(ErrorLevel::WARNING, "w", "/app/a.rs", 2);
    let err = console.handle_error(&mut warning).unwrap_err();
    assert!(err.is_config());
}

#[test]
fn test_emailed_log_restores() {
    let mailer = MemoryMailer::new();
    let mut console = Console::builder()
        .environment(StaticEnvironment::cli("bin/sync").with_request_id("sync-1"))
        .route(EmailRoute::new(mailer.clone(), EmailConfig::default().with_to("dev@example.com")))
        .route(TextRoute::default())
        .build();

    console.alert("sync degraded", AlertLevel::Warn);
    console.group(args!["batch", 1]);
    console.log(args!["rows", 250]);
    console.group_end();
    console.table(
        Value::list(vec![Value::map(vec![("id", 1), ("ok", 1)])]),
        Some("results"),
        None,
    );
    let original = console.output().body;

    let sent = mailer.sent();
    assert_eq!(sent[0].subject, "Debug Log: $ bin/sync");
    let log = unserialize_log(&sent[0].body).unwrap();
    assert_eq!(log.request_id, "sync-1");

    let mut restored = Console::builder().route(TextRoute::default()).build();
    for entry in log.entries() {
        restored.append(entry.clone());
    }
    assert_eq!(restored.output().body, original);
}

#[test]
fn test_stream_and_server_log_files() {
    let dir = TempDir::new().unwrap();
    let stream_path = dir.path().join("stream.log");
    let server_dir = dir.path().join("server");

    let mut console = Console::builder()
        .environment(StaticEnvironment::http("GET", "/files").with_request_id("f1"))
        .route(StreamRoute::new(StreamConfig::file(&stream_path)))
        .route(ServerLogRoute::new(ServerLogConfig::new(&server_dir).with_gc(0.0, 60)))
        .build();
    console.bootstrap();
    console.info(args!["uploaded", 2]);

    let streamed = fs::read_to_string(&stream_path).unwrap();
    assert!(streamed.ends_with("ℹ uploaded = 2\n"));

    let output = console.output();
    let url = output.header(SERVER_LOG_HEADER).unwrap();
    let filename = url.rsplit('/').next().unwrap();
    assert!(server_dir.join(filename).is_file());
}

#[test]
fn test_wamp_over_channel() {
    let (publisher, receiver) = ChannelPublisher::unbounded();
    let consumer = std::thread::spawn(move || {
        receiver
            .iter()
            .map(|(_, message)| message[0].as_str().unwrap_or_default().to_string())
            .take_while(|method| method != "endOutput")
            .collect::<Vec<_>>()
    });

    let mut console = Console::builder()
        .route(WampRoute::new(publisher, WampConfig::default()))
        .build();
    console.bootstrap();
    console.log(args!["one"]);
    console.group(args!["two"]);
    console.output();
    drop(console);

    let methods = consumer.join().unwrap();
    assert_eq!(methods, vec!["meta", "log", "group", "groupEnd"]);
}

#[test]
fn test_large_firephp_message_chunks() {
    let mut console = Console::builder().route(FirePhpRoute::default()).build();
    console.log(args!["x".repeat(FIREPHP_CHUNK_SIZE * 2)]);

    let output = console.output();
    // heading, two chunks plus remainder for the large entry, group end
    assert_eq!(output.header("X-Wf-1-Index"), Some("5"));
    assert!(output.header("X-Wf-1-1-1-2").unwrap().ends_with("|\\"));
}
