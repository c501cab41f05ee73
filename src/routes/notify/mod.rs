//! Error-notification routes
//!
//! Each route subscribes to error events, runs them through its own
//! [`ErrorThrottle`] and delivers the survivors: Slack, Discord and Teams
//! through a [`WebhookTransport`], email through a [`Mailer`].
//!
//! The destination (webhook URL or recipients) comes from the route config,
//! falling back to an environment variable. A missing destination is only
//! reported once a notification actually has to go out.

mod discord;
mod email;
mod slack;
mod teams;

pub use discord::DiscordRoute;
pub use email::EmailErrorRoute;
pub use slack::SlackRoute;
pub use teams::TeamsRoute;

use crate::core::{
    ConsoleError, Environment, ErrorCategory, ErrorContext, ErrorEvent, ErrorLevel, ErrorThrottle,
    Result, RouteConfig, ThrottleDecision, TraceFrame,
};
use parking_lot::Mutex;
use serde_json::Value as Json;
use std::sync::Arc;

/// Settings shared by every notification route
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    pub route: RouteConfig,
    /// Minutes during which a repeat of the same error is not sent again
    pub throttle_min: u32,
    pub error_mask: ErrorLevel,
    /// Webhook URL or comma separated recipients
    pub destination: Option<String>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            route: RouteConfig::default(),
            throttle_min: 60,
            error_mask: ErrorLevel::NOTIFY_DEFAULT,
            destination: None,
        }
    }
}

impl NotifyConfig {
    #[must_use]
    pub fn with_route(mut self, route: RouteConfig) -> Self {
        self.route = route;
        self
    }

    #[must_use]
    pub fn with_throttle(mut self, minutes: u32) -> Self {
        self.throttle_min = minutes;
        self
    }

    #[must_use]
    pub fn with_error_mask(mut self, mask: ErrorLevel) -> Self {
        self.error_mask = mask;
        self
    }

    #[must_use]
    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }
}

/// Throttle plus destination lookup
#[derive(Debug, Clone)]
pub(crate) struct Notifier {
    throttle: ErrorThrottle,
    destination: Option<String>,
    env_var: &'static str,
}

impl Notifier {
    pub(crate) fn new(sink_key: &str, config: &NotifyConfig, env_var: &'static str) -> Self {
        Self {
            throttle: ErrorThrottle::new(sink_key, config.throttle_min, config.error_mask),
            destination: config.destination.clone(),
            env_var,
        }
    }

    /// Run the throttle; throttled repeats are counted as suppressed
    ///
    /// Admission does not start a throttle window, [`Notifier::delivered`] does.
    pub(crate) fn admit(&self, error: &mut ErrorEvent, ctx: &ErrorContext<'_>) -> bool {
        match self.throttle.decide(error) {
            ThrottleDecision::Send => true,
            ThrottleDecision::Throttled => {
                ctx.metrics.record_notification_suppressed();
                tracing::debug!(
                    sink = self.throttle.sink_key(),
                    hash = %error.hash,
                    "notification throttled"
                );
                false
            }
            _ => false,
        }
    }

    pub(crate) fn destination(&self, env: &dyn Environment) -> Result<String> {
        self.destination
            .clone()
            .or_else(|| env.env_var(self.env_var))
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| {
                ConsoleError::config(
                    self.throttle.sink_key().to_string(),
                    format!("no destination configured and {} is not set", self.env_var),
                )
            })
    }

    /// Count a delivery; transport failures are logged and dropped
    pub(crate) fn delivered(
        &self,
        result: Result<()>,
        error: &mut ErrorEvent,
        ctx: &ErrorContext<'_>,
    ) {
        match result {
            Ok(()) => {
                self.throttle.record_sent(error);
                ctx.metrics.record_notification_sent();
            }
            Err(e) => {
                tracing::warn!(sink = self.throttle.sink_key(), error = %e, "notification not delivered");
            }
        }
    }
}

/// Notifier bound to a webhook transport
pub(crate) struct WebhookSink {
    notifier: Notifier,
    transport: Box<dyn WebhookTransport>,
}

impl WebhookSink {
    pub(crate) fn new<T: WebhookTransport + 'static>(notifier: Notifier, transport: T) -> Self {
        Self {
            notifier,
            transport: Box::new(transport),
        }
    }

    pub(crate) fn notify<F>(
        &self,
        error: &mut ErrorEvent,
        ctx: &ErrorContext<'_>,
        payload: F,
    ) -> Result<()>
    where
        F: FnOnce(&ErrorEvent, &dyn Environment) -> Json,
    {
        if !self.notifier.admit(error, ctx) {
            return Ok(());
        }
        let url = self.notifier.destination(ctx.env)?;
        let body = payload(error, ctx.env);
        let posted = self.transport.post_json(&url, &body);
        self.notifier.delivered(posted, error, ctx);
        Ok(())
    }
}

/// `"Warning: message"`
pub(crate) fn headline(error: &ErrorEvent) -> String {
    format!("{}: {}", error.category().label(), error.message)
}

/// `"file:line function"`
pub(crate) fn frame_line(frame: &TraceFrame) -> String {
    match &frame.function {
        Some(function) => format!("{}:{} {}", frame.file, frame.line, function),
        None => format!("{}:{}", frame.file, frame.line),
    }
}

/// Backtrace lines for chat sinks, which only show them for fatal errors
pub(crate) fn fatal_backtrace(error: &ErrorEvent) -> Option<Vec<String>> {
    if !error.is_fatal() || error.backtrace.is_empty() {
        return None;
    }
    Some(error.backtrace.iter().map(frame_line).collect())
}

/// Slack emoji shortcode for the header block
pub(crate) fn category_emoji(category: ErrorCategory) -> &'static str {
    match category {
        ErrorCategory::Fatal => ":rotating_light:",
        ErrorCategory::Error => ":x:",
        ErrorCategory::Warning => ":warning:",
        _ => ":information_source:",
    }
}

/// Posts a JSON document to a webhook URL
pub trait WebhookTransport: Send {
    fn post_json(&self, url: &str, payload: &Json) -> Result<()>;
}

/// Records requests instead of sending them; clones share the buffer
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    requests: Arc<Mutex<Vec<(String, Json)>>>,
    fail: bool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose every post fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<(String, Json)> {
        self.requests.lock().clone()
    }
}

impl WebhookTransport for MemoryTransport {
    fn post_json(&self, url: &str, payload: &Json) -> Result<()> {
        if self.fail {
            return Err(ConsoleError::transport("webhook", "connection refused"));
        }
        self.requests.lock().push((url.to_string(), payload.clone()));
        Ok(())
    }
}

/// Blocking HTTP transport
#[cfg(feature = "webhook")]
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

#[cfg(feature = "webhook")]
impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        Self::with_timeout(std::time::Duration::from_secs(5))
    }

    pub fn with_timeout(timeout: std::time::Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConsoleError::config("webhook", e.to_string()))?;
        Ok(Self { client })
    }
}

#[cfg(feature = "webhook")]
impl WebhookTransport for ReqwestTransport {
    fn post_json(&self, url: &str, payload: &Json) -> Result<()> {
        self.client
            .post(url)
            .json(payload)
            .send()
            .and_then(|response| response.error_for_status())
            .map(|_| ())
            // webhook URLs carry credentials, keep them out of the message
            .map_err(|e| ConsoleError::transport("webhook", e.without_url().to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Outbound mail
pub trait Mailer: Send {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// Keeps sent mail in memory; clones share the outbox
#[derive(Debug, Clone, Default)]
pub struct MemoryMailer {
    outbox: Arc<Mutex<Vec<SentEmail>>>,
    fail: bool,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer that rejects every message
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.outbox.lock().clone()
    }
}

impl Mailer for MemoryMailer {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        if self.fail {
            return Err(ConsoleError::transport("mail", "relay rejected message"));
        }
        self.outbox.lock().push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}
