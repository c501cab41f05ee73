//! # Debug Console
//!
//! An in-process debug console. Application code logs through a
//! browser-console style API; at the end of a request the captured entries
//! are routed to one or more output targets.
//!
//! ## Features
//!
//! - **Console API**: log, info, warn, error, assert, groups, tables, timers,
//!   counters, alerts and channels
//! - **Routes**: HTML, inline script, ChromeLogger, FirePHP and ServerLog
//!   headers, plain or ANSI text, streams, WAMP publishing and email
//! - **Error notifications**: Slack, Discord, Teams and email, throttled per sink
//! - **Isolation**: a failing or panicking route never affects the others
//!
//! ## Example
//!
//! ```
//! use debug_console::prelude::*;
//!
//! let mut console = Console::builder()
//!     .environment(StaticEnvironment::http("GET", "/orders"))
//!     .route(ChromeLoggerRoute::default())
//!     .build();
//!
//! console.group(args!["checkout"]);
//! console.info(args!["items", 3]);
//! console.group_end();
//!
//! let output = console.output();
//! assert!(output.header(CHROME_LOGGER_HEADER).is_some());
//! ```

pub mod core;
pub mod macros;
pub mod routes;

pub mod prelude {
    pub use crate::args;
    pub use crate::core::{
        AlertLevel, Console, ConsoleBuilder, ConsoleError, Environment, ErrorEvent, ErrorLevel,
        FnInterceptor, Interceptor, LogEntry, Meta, Method, ObjectValue, OutputResult, Result,
        Route, RouteConfig, StaticEnvironment, TraceFrame, Value,
    };
    pub use crate::routes::{
        ChromeLoggerRoute, FirePhpRoute, HtmlRoute, ScriptRoute, ServerLogRoute, StreamRoute,
        TextRoute, CHROME_LOGGER_HEADER,
    };
}

pub use crate::core::{
    AlertLevel, Channel, Console, ConsoleBuilder, ConsoleConfig, ConsoleError, Environment,
    ErrorCategory, ErrorContext, ErrorEvent, ErrorLevel, ErrorSummary, ErrorThrottle,
    FnInterceptor, Interceptor, LogEntry, LogSnapshot, Meta, Method, ObjectValue, OutputContext,
    OutputMetrics, OutputResult, RenderScope, Result, Route, RouteBase, RouteConfig,
    StaticEnvironment, Subscription, TimestampFormat, TraceFrame, Value, DEFAULT_CHANNEL,
};
pub use crate::routes::{
    ChromeLoggerConfig, ChromeLoggerRoute, DiscordRoute, EmailConfig, EmailErrorRoute, EmailRoute,
    FirePhpConfig, FirePhpRoute, HtmlConfig, HtmlRoute, MemoryMailer, MemoryPublisher,
    MemoryTransport, NotifyConfig, ScriptConfig, ScriptRoute, ServerLogConfig, ServerLogRoute,
    SlackRoute, StreamConfig, StreamRoute, TeamsRoute, TextConfig, TextRoute, WampConfig,
    WampRoute,
};
