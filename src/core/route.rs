//! Route trait for output destinations
//!
//! A route consumes the ordered entry stream (alerts, then summary highest
//! priority first, then the main log) and turns it into a sink specific
//! artifact: a body fragment, response headers, published messages or an
//! outbound request.

use super::channel_filter::{default_channels, ChannelFilter};
use super::environment::Environment;
use super::error::Result;
use super::error_event::{ErrorEvent, ErrorSummary};
use super::interceptor::InterceptorChain;
use super::log_entry::{LogEntry, Method};
use super::log_store::LogSnapshot;
use super::metrics::OutputMetrics;
use super::value::Value;
use serde::{Deserialize, Serialize};

/// Lifecycle events a route can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Bootstrap,
    Config,
    /// An entry was just recorded
    Log,
    /// Output pass
    Output,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    pub event: EventKind,
    /// Higher runs first; ties keep registration order
    pub priority: i32,
}

impl Subscription {
    pub const fn new(event: EventKind, priority: i32) -> Self {
        Self { event, priority }
    }

    pub const fn output() -> Self {
        Self::new(EventKind::Output, 0)
    }
}

/// Channel selection shared by every route config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteConfig {
    #[serde(default = "default_channels")]
    pub channels: Vec<String>,
    #[serde(default)]
    pub channels_exclude: Vec<String>,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            channels: default_channels(),
            channels_exclude: Vec::new(),
        }
    }
}

impl RouteConfig {
    #[must_use]
    pub fn with_channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channels = channels.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_channels_exclude<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channels_exclude = channels.into_iter().map(Into::into).collect();
        self
    }
}

/// State every route carries
#[derive(Debug, Clone)]
pub struct RouteBase {
    name: String,
    filter: ChannelFilter,
}

impl RouteBase {
    pub fn new(name: impl Into<String>, config: &RouteConfig) -> Self {
        Self {
            name: name.into(),
            filter: ChannelFilter::new(config.channels.clone(), config.channels_exclude.clone()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn filter_mut(&mut self) -> &mut ChannelFilter {
        &mut self.filter
    }

    pub fn should_include(&mut self, entry: &LogEntry) -> bool {
        self.filter.should_include(entry.channel_name())
    }
}

/// What a render needs besides the entry
#[derive(Debug, Clone, Copy)]
pub struct RenderScope<'a> {
    pub interceptors: &'a InterceptorChain,
    pub metrics: &'a OutputMetrics,
}

/// Everything a route sees during one output pass
pub struct OutputContext<'a> {
    pub snapshot: &'a LogSnapshot,
    pub env: &'a dyn Environment,
    pub errors: &'a ErrorSummary,
    pub scope: RenderScope<'a>,
    /// Channel diagnostics are logged under
    pub channel: &'a str,
    headers: Vec<(String, String)>,
    body: Vec<String>,
    diagnostics: Vec<LogEntry>,
}

impl<'a> OutputContext<'a> {
    pub fn new(
        snapshot: &'a LogSnapshot,
        env: &'a dyn Environment,
        errors: &'a ErrorSummary,
        scope: RenderScope<'a>,
        channel: &'a str,
    ) -> Self {
        Self {
            snapshot,
            env,
            errors,
            scope,
            channel,
            headers: Vec::new(),
            body: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push((name.into(), value.into()));
    }

    pub fn push_body(&mut self, fragment: impl Into<String>) {
        self.body.push(fragment.into());
    }

    /// Queue a warning entry for the log once the pass is over
    pub fn warn(&mut self, message: impl Into<String>) {
        self.diagnostics.push(LogEntry::new(
            self.channel,
            Method::Warn,
            vec![Value::from(message.into())],
        ));
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> &[String] {
        &self.body
    }

    pub fn diagnostics(&self) -> &[LogEntry] {
        &self.diagnostics
    }

    /// Headers, body fragments and diagnostics, in that order
    pub fn into_parts(self) -> (Vec<(String, String)>, Vec<String>, Vec<LogEntry>) {
        (self.headers, self.body, self.diagnostics)
    }
}

pub struct BootstrapContext<'a> {
    pub env: &'a dyn Environment,
    /// Whether output is enabled at bootstrap time
    pub output: bool,
}

/// A configuration update; `None` fields were not touched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigChange {
    pub output: Option<bool>,
    pub collect: Option<bool>,
}

/// Entries recorded so far, for routes that replay on config changes
pub struct ReplayContext<'a> {
    pub snapshot: &'a LogSnapshot,
    pub env: &'a dyn Environment,
    pub scope: RenderScope<'a>,
}

/// What an error-notification route sees
#[derive(Clone, Copy)]
pub struct ErrorContext<'a> {
    pub env: &'a dyn Environment,
    pub metrics: &'a OutputMetrics,
}

pub trait Route: Send {
    fn base(&self) -> &RouteBase;

    fn base_mut(&mut self) -> &mut RouteBase;

    fn name(&self) -> &str {
        self.base().name()
    }

    fn subscriptions(&self) -> Vec<Subscription>;

    /// Diagnostics to record when the route is registered
    fn attach(&mut self) -> Vec<LogEntry> {
        Vec::new()
    }

    /// Output pass
    fn process_log_entries(&mut self, _ctx: &mut OutputContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Render one entry that already passed filtering and interception
    fn process_log_entry(&mut self, entry: &LogEntry) -> Result<Option<String>>;

    fn on_log(&mut self, _entry: &LogEntry, _scope: &RenderScope<'_>) -> Result<()> {
        Ok(())
    }

    fn on_bootstrap(&mut self, _ctx: &BootstrapContext<'_>) -> Result<()> {
        Ok(())
    }

    fn on_config(&mut self, _change: &ConfigChange, _ctx: &ReplayContext<'_>) -> Result<()> {
        Ok(())
    }

    fn on_error(&mut self, _error: &mut ErrorEvent, _ctx: &ErrorContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Filter, clone, intercept and render one entry
    ///
    /// Returns the interceptor's output when one short-circuited, otherwise
    /// whatever [`Route::process_log_entry`] produced. A failed render is
    /// logged and counted, and yields `None`.
    fn render_entry(&mut self, entry: &LogEntry, scope: &RenderScope<'_>) -> Option<String> {
        if !self.base_mut().should_include(entry) {
            return None;
        }
        let mut entry = entry.clone();
        if let Some(output) = scope.interceptors.run(self.name(), &mut entry) {
            return Some(output);
        }
        if !entry.meta.output() {
            return None;
        }
        if let Some(output) = entry.meta.return_value() {
            return Some(output.to_string());
        }
        match self.process_log_entry(&entry) {
            Ok(output) => {
                scope.metrics.record_rendered();
                output
            }
            Err(e) => {
                scope.metrics.record_entry_failed();
                tracing::warn!(
                    route = self.name(),
                    method = entry.method.as_str(),
                    error = %e,
                    "failed to render log entry"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ConsoleError, FnInterceptor};

    struct Recorder {
        base: RouteBase,
    }

    impl Route for Recorder {
        fn base(&self) -> &RouteBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut RouteBase {
            &mut self.base
        }

        fn subscriptions(&self) -> Vec<Subscription> {
            vec![Subscription::output()]
        }

        fn process_log_entry(&mut self, entry: &LogEntry) -> Result<Option<String>> {
            if entry.method == Method::Error {
                return Err(ConsoleError::formatter("recorder", "refused"));
            }
            Ok(Some(entry.first_arg_text()))
        }
    }

    fn recorder(config: RouteConfig) -> Recorder {
        Recorder {
            base: RouteBase::new("recorder", &config),
        }
    }

    #[test]
    fn test_render_entry_filters_channels() {
        let chain = InterceptorChain::new();
        let metrics = OutputMetrics::new();
        let scope = RenderScope {
            interceptors: &chain,
            metrics: &metrics,
        };
        let mut route = recorder(RouteConfig::default().with_channels_exclude(["general.db*"]));

        let kept = LogEntry::new("general", Method::Log, vec![Value::from("a")]);
        let dropped = LogEntry::new("general.db", Method::Log, vec![Value::from("b")]);
        assert_eq!(route.render_entry(&kept, &scope).as_deref(), Some("a"));
        assert_eq!(route.render_entry(&dropped, &scope), None);
        assert_eq!(metrics.entries_rendered(), 1);
    }

    #[test]
    fn test_render_entry_isolates_failures() {
        let chain = InterceptorChain::new();
        let metrics = OutputMetrics::new();
        let scope = RenderScope {
            interceptors: &chain,
            metrics: &metrics,
        };
        let mut route = recorder(RouteConfig::default());

        let bad = LogEntry::new("general", Method::Error, vec![Value::from("x")]);
        assert_eq!(route.render_entry(&bad, &scope), None);
        assert_eq!(metrics.entries_failed(), 1);
    }

    #[test]
    fn test_interceptor_mutation_stays_on_clone() {
        let mut chain = InterceptorChain::new();
        chain.push(Box::new(FnInterceptor::new(|_: &str, e: &mut LogEntry| {
            e.args[0] = Value::from("changed");
            None
        })));
        let metrics = OutputMetrics::new();
        let scope = RenderScope {
            interceptors: &chain,
            metrics: &metrics,
        };
        let mut route = recorder(RouteConfig::default());

        let entry = LogEntry::new("general", Method::Log, vec![Value::from("original")]);
        assert_eq!(route.render_entry(&entry, &scope).as_deref(), Some("changed"));
        assert_eq!(entry.first_arg_text(), "original");
    }

    #[test]
    fn test_return_meta_short_circuits() {
        let mut chain = InterceptorChain::new();
        chain.push(Box::new(FnInterceptor::new(|_: &str, e: &mut LogEntry| {
            e.meta.set_return_value("<b>custom</b>");
            None
        })));
        let metrics = OutputMetrics::new();
        let scope = RenderScope {
            interceptors: &chain,
            metrics: &metrics,
        };
        let mut route = recorder(RouteConfig::default());
        let entry = LogEntry::new("general", Method::Log, vec![Value::from("x")]);
        assert_eq!(route.render_entry(&entry, &scope).as_deref(), Some("<b>custom</b>"));
    }
}
