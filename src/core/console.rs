//! Request-scoped debug console
//!
//! The console records entries into its [`LogStore`], tracks group nesting,
//! forwards real-time events to subscribed routes and runs the output pass.
//! One console serves one logical request; it is never shared.

use super::environment::{trace_to_value, Environment, StaticEnvironment, TraceFrame};
use super::error::{ConsoleError, Result};
use super::error_event::{ErrorEvent, ErrorSummary};
use super::group_stack::{open_group_indexes, GroupFrame, GroupPop, GroupStack};
use super::interceptor::{Interceptor, InterceptorChain};
use super::log_entry::{LogEntry, Meta, Method};
use super::log_store::{LogStore, StackKey};
use super::metrics::OutputMetrics;
use super::route::{
    BootstrapContext, ConfigChange, ErrorContext, EventKind, OutputContext, RenderScope,
    ReplayContext, Route,
};
use super::value::Value;
use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe, Location};
use std::sync::Arc;
use std::time::Instant;

/// Name of the root channel unless configured otherwise
pub const DEFAULT_CHANNEL: &str = "general";

const DEFAULT_LABEL: &str = "default";

/// Alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlertLevel {
    #[default]
    Error,
    Info,
    Success,
    Warn,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Error => "error",
            AlertLevel::Info => "info",
            AlertLevel::Success => "success",
            AlertLevel::Warn => "warn",
        }
    }
}

/// Headers and body produced by one output pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputResult {
    pub body: String,
    pub headers: Vec<(String, String)>,
}

impl OutputResult {
    /// First header with the given name (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty() && self.headers.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Root channel name
    pub channel: String,
    /// Run output passes at all
    pub output: bool,
    /// Record entries
    pub collect: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            channel: DEFAULT_CHANNEL.to_string(),
            output: true,
            collect: true,
        }
    }
}

pub struct Console {
    config: ConsoleConfig,
    env: Box<dyn Environment>,
    store: LogStore,
    groups: GroupStack,
    routes: Vec<Box<dyn Route>>,
    interceptors: InterceptorChain,
    errors: ErrorSummary,
    seen_errors: HashSet<String>,
    counters: HashMap<String, u64>,
    timers: HashMap<String, Instant>,
    profiles: HashMap<String, Instant>,
    bootstrapped: bool,
    metrics: Arc<OutputMetrics>,
}

impl Console {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ConsoleConfig::default(), Box::new(StaticEnvironment::default()))
    }

    #[must_use]
    pub fn with_config(config: ConsoleConfig, env: Box<dyn Environment>) -> Self {
        Self {
            config,
            env,
            store: LogStore::new(),
            groups: GroupStack::new(),
            routes: Vec::new(),
            interceptors: InterceptorChain::new(),
            errors: ErrorSummary::new(),
            seen_errors: HashSet::new(),
            counters: HashMap::new(),
            timers: HashMap::new(),
            profiles: HashMap::new(),
            bootstrapped: false,
            metrics: Arc::new(OutputMetrics::new()),
        }
    }

    #[must_use]
    pub fn builder() -> ConsoleBuilder {
        ConsoleBuilder::new()
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn env(&self) -> &dyn Environment {
        self.env.as_ref()
    }

    pub fn store(&self) -> &LogStore {
        &self.store
    }

    pub fn groups(&self) -> &GroupStack {
        &self.groups
    }

    pub fn errors(&self) -> &ErrorSummary {
        &self.errors
    }

    pub fn metrics(&self) -> &OutputMetrics {
        &self.metrics
    }

    /// Shared handle to the metrics, for hosts that report them elsewhere
    pub fn metrics_handle(&self) -> Arc<OutputMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn routes(&self) -> impl Iterator<Item = &dyn Route> {
        self.routes.iter().map(|r| r.as_ref())
    }

    /// Register a route; its attach diagnostics are recorded as alerts
    pub fn add_route(&mut self, mut route: Box<dyn Route>) {
        for entry in route.attach() {
            self.store.push_alert(entry);
        }
        tracing::debug!(route = route.name(), "route registered");
        self.routes.push(route);
    }

    pub fn add_interceptor(&mut self, interceptor: Box<dyn Interceptor>) {
        self.interceptors.push(interceptor);
    }

    /// Fully qualified channel handle
    pub fn channel(&mut self, name: &str) -> Channel<'_> {
        let root = &self.config.channel;
        let name = if name == root || name.starts_with(&format!("{}.", root)) {
            name.to_string()
        } else {
            format!("{}.{}", root, name)
        };
        Channel {
            console: self,
            name,
        }
    }

    /// Route indexes subscribed to `event`, highest priority first
    fn subscribers(&self, event: EventKind) -> Vec<usize> {
        let mut subs: Vec<(i32, usize)> = self
            .routes
            .iter()
            .enumerate()
            .filter_map(|(idx, route)| {
                route
                    .subscriptions()
                    .iter()
                    .find(|s| s.event == event)
                    .map(|s| (s.priority, idx))
            })
            .collect();
        subs.sort_by(|a, b| b.0.cmp(&a.0));
        subs.into_iter().map(|(_, idx)| idx).collect()
    }

    fn dispatch_log(&mut self, entry: &LogEntry) {
        let scope = RenderScope {
            interceptors: &self.interceptors,
            metrics: &self.metrics,
        };
        for idx in self.subscribers(EventKind::Log) {
            let route = &mut self.routes[idx];
            if let Err(e) = route.on_log(entry, &scope) {
                tracing::warn!(route = route.name(), error = %e, "real-time route failed");
            }
        }
    }

    /// Append to `key` and notify real-time routes, ignoring `collect`
    fn append_to(&mut self, key: StackKey, entry: LogEntry) {
        self.dispatch_log(&entry);
        self.store.push(key, entry);
    }

    /// Record a prebuilt entry in the current container
    pub fn append(&mut self, entry: LogEntry) {
        if !self.config.collect {
            return;
        }
        if entry.method == Method::Alert {
            self.dispatch_log(&entry);
            self.store.push_alert(entry);
            return;
        }
        let key = self.groups.current_key();
        self.append_to(key, entry);
    }

    #[track_caller]
    fn record(&mut self, channel: String, method: Method, args: Vec<Value>, meta: Meta) {
        let caller = Location::caller();
        let entry = LogEntry::new(channel, method, args)
            .with_location(caller.file(), caller.line())
            .with_meta(meta);
        self.append(entry);
    }

    fn root(&self) -> String {
        self.config.channel.clone()
    }

    #[track_caller]
    pub fn log(&mut self, args: Vec<Value>) {
        self.record(self.root(), Method::Log, args, Meta::new());
    }

    #[track_caller]
    pub fn info(&mut self, args: Vec<Value>) {
        self.record(self.root(), Method::Info, args, Meta::new());
    }

    #[track_caller]
    pub fn warn(&mut self, args: Vec<Value>) {
        self.record(self.root(), Method::Warn, args, Meta::new());
    }

    #[track_caller]
    pub fn error(&mut self, args: Vec<Value>) {
        self.record(self.root(), Method::Error, args, Meta::new());
    }

    /// Logs only when `condition` is false
    #[track_caller]
    pub fn assert(&mut self, condition: bool, args: Vec<Value>) {
        if !condition {
            let args = if args.is_empty() {
                vec![Value::from("Assertion failed")]
            } else {
                args
            };
            self.record(self.root(), Method::Assert, args, Meta::new());
        }
    }

    /// Drop main-log entries except errors, warnings and open group headers
    #[track_caller]
    pub fn clear(&mut self) {
        if !self.config.collect {
            return;
        }
        let key = self.groups.current_key();
        let container = self.store.container_mut(key);
        let keep = open_group_indexes(container);
        let mut idx = 0;
        container.retain(|entry| {
            let retain = keep.contains(&idx)
                || matches!(entry.method, Method::Error | Method::Warn);
            idx += 1;
            retain
        });
        self.record(
            self.root(),
            Method::Clear,
            vec![Value::from("Cleared log (sans errors)")],
            Meta::new(),
        );
    }

    #[track_caller]
    pub fn count(&mut self, label: Option<&str>) -> u64 {
        let label = label.unwrap_or(DEFAULT_LABEL);
        let count = self.counters.entry(label.to_string()).or_insert(0);
        *count += 1;
        let count = *count;
        self.record(
            self.root(),
            Method::Count,
            vec![Value::from(label), Value::from(count)],
            Meta::new(),
        );
        count
    }

    #[track_caller]
    pub fn count_reset(&mut self, label: Option<&str>) {
        let label = label.unwrap_or(DEFAULT_LABEL);
        if let Some(count) = self.counters.get_mut(label) {
            *count = 0;
        } else {
            self.record(
                self.root(),
                Method::Warn,
                vec![Value::from(format!("Counter '{}' doesn't exist.", label))],
                Meta::new(),
            );
            return;
        }
        self.record(
            self.root(),
            Method::CountReset,
            vec![Value::from(label), Value::from(0)],
            Meta::new(),
        );
    }

    #[track_caller]
    fn open_group(&mut self, channel: String, method: Method, args: Vec<Value>) {
        let args = if args.is_empty() {
            vec![Value::from("group")]
        } else {
            args
        };
        let collecting = self.config.collect;
        self.groups.push(GroupFrame {
            channel: channel.clone(),
            collecting,
        });
        self.record(channel, method, args, Meta::new());
    }

    #[track_caller]
    pub fn group(&mut self, args: Vec<Value>) {
        self.open_group(self.root(), Method::Group, args);
    }

    #[track_caller]
    pub fn group_collapsed(&mut self, args: Vec<Value>) {
        self.open_group(self.root(), Method::GroupCollapsed, args);
    }

    /// Close the innermost group, or the innermost summary section
    pub fn group_end(&mut self) {
        let key = self.groups.current_key();
        match self.groups.pop() {
            GroupPop::Group(frame) if frame.collecting => {
                self.append_to(key, LogEntry::new(frame.channel, Method::GroupEnd, Vec::new()));
            }
            GroupPop::Group(_) | GroupPop::Summary(_) | GroupPop::Empty => {}
        }
    }

    /// Log to the summary at `priority` until the matching [`Console::group_end`]
    pub fn group_summary(&mut self, priority: i32) {
        self.groups.open_summary(priority);
    }

    /// Expand every currently open collapsed group
    pub fn group_uncollapse(&mut self) {
        if !self.config.collect {
            return;
        }
        let key = self.groups.current_key();
        let container = self.store.container_mut(key);
        for idx in open_group_indexes(container) {
            container[idx].method = Method::Group;
        }
        let entry = LogEntry::new(self.root(), Method::GroupUncollapse, Vec::new());
        self.dispatch_log(&entry);
    }

    #[track_caller]
    pub fn table(&mut self, data: Value, caption: Option<&str>, columns: Option<Vec<String>>) {
        let mut meta = Meta::new();
        if let Some(caption) = caption {
            meta.set("caption", caption);
        }
        if let Some(columns) = columns {
            meta.set("columns", Value::from(columns));
        }
        self.record(self.root(), Method::Table, vec![data], meta);
    }

    /// Log the environment's backtrace, or the caller's location without one
    #[track_caller]
    pub fn trace(&mut self) {
        let mut frames = self.env.backtrace();
        if frames.is_empty() {
            let caller = Location::caller();
            frames.push(TraceFrame::new(caller.file(), caller.line()));
        }
        let meta = Meta::new()
            .with("caption", "trace")
            .with("columns", Value::from(vec!["file", "line", "function"]));
        self.record(self.root(), Method::Trace, vec![trace_to_value(&frames)], meta);
    }

    #[track_caller]
    pub fn profile(&mut self, name: &str) {
        self.profiles.insert(name.to_string(), Instant::now());
        self.record(
            self.root(),
            Method::Profile,
            vec![Value::from(format!("Profile '{}' started", name))],
            Meta::new(),
        );
    }

    /// Log `data` as the results table of profile `name`
    #[track_caller]
    pub fn profile_end(&mut self, name: &str, data: Value) {
        match self.profiles.remove(name) {
            Some(started) => {
                let meta = Meta::new()
                    .with("caption", format!("Profile '{}' Results", name))
                    .with("elapsed", started.elapsed().as_secs_f64());
                self.record(self.root(), Method::ProfileEnd, vec![data], meta);
            }
            None => self.record(
                self.root(),
                Method::Warn,
                vec![Value::from(format!("profileEnd: No such Profile: {}", name))],
                Meta::new(),
            ),
        }
    }

    pub fn time(&mut self, label: Option<&str>) {
        self.timers
            .insert(label.unwrap_or(DEFAULT_LABEL).to_string(), Instant::now());
    }

    #[track_caller]
    pub fn time_log(&mut self, label: Option<&str>) {
        self.log_timer(label, Method::TimeLog, false);
    }

    #[track_caller]
    pub fn time_end(&mut self, label: Option<&str>) {
        self.log_timer(label, Method::TimeEnd, true);
    }

    #[track_caller]
    fn log_timer(&mut self, label: Option<&str>, method: Method, remove: bool) {
        let label = label.unwrap_or(DEFAULT_LABEL);
        let started = if remove {
            self.timers.remove(label)
        } else {
            self.timers.get(label).copied()
        };
        match started {
            Some(started) => {
                let secs = started.elapsed().as_secs_f64();
                self.record(
                    self.root(),
                    method,
                    vec![Value::from(format!("{}: {:.4} sec", label, secs))],
                    Meta::new(),
                );
            }
            None => self.record(
                self.root(),
                Method::Warn,
                vec![Value::from(format!("Timer '{}' does not exist", label))],
                Meta::new(),
            ),
        }
    }

    #[track_caller]
    pub fn alert(&mut self, message: &str, level: AlertLevel) {
        let meta = Meta::new().with("level", level.as_str());
        self.record(self.root(), Method::Alert, vec![Value::from(message)], meta);
    }

    /// Notify bootstrap subscribers, once
    pub fn bootstrap(&mut self) {
        if self.bootstrapped {
            return;
        }
        self.bootstrapped = true;
        let ctx = BootstrapContext {
            env: self.env.as_ref(),
            output: self.config.output,
        };
        for idx in self.subscribers(EventKind::Bootstrap) {
            let route = &mut self.routes[idx];
            if let Err(e) = route.on_bootstrap(&ctx) {
                tracing::warn!(route = route.name(), error = %e, "bootstrap handler failed");
            }
        }
    }

    pub fn set_output(&mut self, output: bool) {
        self.config.output = output;
        self.dispatch_config(ConfigChange {
            output: Some(output),
            collect: None,
        });
    }

    pub fn set_collect(&mut self, collect: bool) {
        self.config.collect = collect;
        self.dispatch_config(ConfigChange {
            output: None,
            collect: Some(collect),
        });
    }

    fn dispatch_config(&mut self, change: ConfigChange) {
        let snapshot = self.store.snapshot();
        let ctx = ReplayContext {
            snapshot: &snapshot,
            env: self.env.as_ref(),
            scope: RenderScope {
                interceptors: &self.interceptors,
                metrics: &self.metrics,
            },
        };
        for idx in self.subscribers(EventKind::Config) {
            let route = &mut self.routes[idx];
            if let Err(e) = route.on_config(&change, &ctx) {
                tracing::warn!(route = route.name(), error = %e, "config handler failed");
            }
        }
    }

    /// Record an error and hand it to the error-notification routes
    ///
    /// Every subscriber sees the error even when an earlier one fails; the
    /// first configuration error is returned.
    pub fn handle_error(&mut self, error: &mut ErrorEvent) -> Result<()> {
        if !self.seen_errors.insert(error.hash.clone()) {
            error.is_first_occur = false;
        }

        if self.config.collect && !error.throw {
            let category = error.category();
            let method = if category.is_error() {
                Method::Error
            } else {
                Method::Warn
            };
            let label = format!("{}:", capitalize(category.as_str()));
            let entry = LogEntry::new(
                self.root(),
                method,
                vec![
                    Value::from(label),
                    Value::from(error.message.as_str()),
                    Value::from(error.location()),
                ],
            )
            .with_location(&error.file, error.line)
            .with_meta(
                Meta::new()
                    .with("errorCat", category.as_str())
                    .with("errorHash", error.hash.as_str()),
            );
            self.append(entry);
            error.in_console = true;
        }

        self.errors.record(error);

        let ctx = ErrorContext {
            env: self.env.as_ref(),
            metrics: &self.metrics,
        };
        let mut first_config_error: Option<ConsoleError> = None;
        for idx in self.subscribers(EventKind::Error) {
            let route = &mut self.routes[idx];
            match route.on_error(error, &ctx) {
                Ok(()) => {}
                Err(e) if e.is_config() => {
                    tracing::warn!(route = route.name(), error = %e, "notification route misconfigured");
                    first_config_error.get_or_insert(e);
                }
                Err(e) => {
                    tracing::warn!(route = route.name(), error = %e, "notification route failed");
                }
            }
        }

        match first_config_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Run the output pass
    ///
    /// Open groups are closed first, and real-time routes see those closing
    /// entries too. Then every output route renders the same snapshot. A route
    /// that fails or panics contributes nothing. Afterwards the store and the
    /// error summary are cleared and route diagnostics are appended to the log.
    pub fn output(&mut self) -> OutputResult {
        if !self.config.output {
            return OutputResult::default();
        }

        let closing = self.groups.close_all();
        let closed = closing.len();
        for (key, entry) in closing {
            self.append_to(key, entry);
        }
        let snapshot = self.store.snapshot();
        let scope = RenderScope {
            interceptors: &self.interceptors,
            metrics: &self.metrics,
        };

        let mut result = OutputResult::default();
        let mut diagnostics = Vec::new();
        let order = self.subscribers(EventKind::Output);
        let route_count = order.len();

        for idx in order {
            let route = &mut self.routes[idx];
            let mut ctx = OutputContext::new(
                &snapshot,
                self.env.as_ref(),
                &self.errors,
                scope,
                &self.config.channel,
            );

            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| route.process_log_entries(&mut ctx)));

            match outcome {
                Ok(Ok(())) => {
                    let (headers, body, route_diagnostics) = ctx.into_parts();
                    result.headers.extend(headers);
                    result.body.extend(body);
                    diagnostics.extend(route_diagnostics);
                }
                Ok(Err(e)) => {
                    self.metrics.record_route_failed();
                    tracing::warn!(route = route.name(), error = %e, "route output failed");
                }
                Err(panic_info) => {
                    self.metrics.record_route_failed();
                    let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                        s.to_string()
                    } else if let Some(s) = panic_info.downcast_ref::<String>() {
                        s.clone()
                    } else {
                        "Unknown panic".to_string()
                    };
                    tracing::error!(
                        route = route.name(),
                        panic = %panic_msg,
                        "route panicked during output, other routes continue"
                    );
                }
            }
        }

        self.store.clear();
        self.errors = ErrorSummary::new();
        for entry in diagnostics {
            self.store.push(StackKey::Main, entry);
        }
        self.metrics.record_pass();

        tracing::debug!(
            routes = route_count,
            groups_closed = closed,
            headers = result.headers.len(),
            body_len = result.body.len(),
            "output pass complete"
        );
        result
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Logging handle for a child channel
pub struct Channel<'a> {
    console: &'a mut Console,
    name: String,
}

impl Channel<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    #[track_caller]
    pub fn log(&mut self, args: Vec<Value>) {
        self.console
            .record(self.name.clone(), Method::Log, args, Meta::new());
    }

    #[track_caller]
    pub fn info(&mut self, args: Vec<Value>) {
        self.console
            .record(self.name.clone(), Method::Info, args, Meta::new());
    }

    #[track_caller]
    pub fn warn(&mut self, args: Vec<Value>) {
        self.console
            .record(self.name.clone(), Method::Warn, args, Meta::new());
    }

    #[track_caller]
    pub fn error(&mut self, args: Vec<Value>) {
        self.console
            .record(self.name.clone(), Method::Error, args, Meta::new());
    }

    #[track_caller]
    pub fn group(&mut self, args: Vec<Value>) {
        self.console
            .open_group(self.name.clone(), Method::Group, args);
    }

    #[track_caller]
    pub fn group_collapsed(&mut self, args: Vec<Value>) {
        self.console
            .open_group(self.name.clone(), Method::GroupCollapsed, args);
    }

    pub fn group_end(&mut self) {
        self.console.group_end();
    }

    #[track_caller]
    pub fn table(&mut self, data: Value, caption: Option<&str>) {
        let mut meta = Meta::new();
        if let Some(caption) = caption {
            meta.set("caption", caption);
        }
        self.console
            .record(self.name.clone(), Method::Table, vec![data], meta);
    }
}

/// Builder for constructing a [`Console`] with a fluent API
///
/// # Example
///
/// ```
/// use debug_console::{Console, StaticEnvironment, TextRoute};
///
/// let mut console = Console::builder()
///     .environment(StaticEnvironment::cli("bin/import --dry-run"))
///     .route(TextRoute::default())
///     .build();
///
/// console.log(vec!["imported".into(), 42.into()]);
/// let output = console.output();
/// assert!(output.body.contains("imported"));
/// ```
pub struct ConsoleBuilder {
    config: ConsoleConfig,
    env: Option<Box<dyn Environment>>,
    routes: Vec<Box<dyn Route>>,
    interceptors: Vec<Box<dyn Interceptor>>,
}

impl ConsoleBuilder {
    pub fn new() -> Self {
        Self {
            config: ConsoleConfig::default(),
            env: None,
            routes: Vec::new(),
            interceptors: Vec::new(),
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn channel(mut self, name: impl Into<String>) -> Self {
        self.config.channel = name.into();
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn output(mut self, output: bool) -> Self {
        self.config.output = output;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn collect(mut self, collect: bool) -> Self {
        self.config.collect = collect;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn environment<E: Environment + 'static>(mut self, env: E) -> Self {
        self.env = Some(Box::new(env));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn route<R: Route + 'static>(mut self, route: R) -> Self {
        self.routes.push(Box::new(route));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn interceptor<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.interceptors.push(Box::new(interceptor));
        self
    }

    pub fn build(self) -> Console {
        let env = self
            .env
            .unwrap_or_else(|| Box::new(StaticEnvironment::default()));
        let mut console = Console::with_config(self.config, env);
        for interceptor in self.interceptors {
            console.add_interceptor(interceptor);
        }
        for route in self.routes {
            console.add_route(route);
        }
        console
    }
}

impl Default for ConsoleBuilder {
    fn default() -> Self {
        Self::new()
    }
}
