//! Core console types and traits

pub mod channel_filter;
pub mod console;
pub mod environment;
pub mod error;
pub mod error_event;
pub mod group_stack;
pub mod interceptor;
pub mod log_entry;
pub mod log_store;
pub mod metrics;
pub mod route;
pub mod table;
pub mod throttle;
pub mod timestamp;
pub mod value;

pub use channel_filter::{channel_matches, default_channels, ChannelFilter};
pub use console::{
    AlertLevel, Channel, Console, ConsoleBuilder, ConsoleConfig, OutputResult, DEFAULT_CHANNEL,
};
pub use environment::{
    redact_params, trace_to_value, Environment, Interface, StaticEnvironment, TraceFrame,
    REDACT_REPLACEMENT,
};
pub use error::{ConsoleError, Result};
pub use error_event::{
    CategoryCount, ErrorCategory, ErrorEvent, ErrorLevel, ErrorSummary, ThrottleStat,
};
pub use group_stack::{open_group_indexes, GroupFrame, GroupPop, GroupStack};
pub use interceptor::{FnInterceptor, Interceptor, InterceptorChain};
pub use log_entry::{LogEntry, Meta, Method};
pub use log_store::{LogSnapshot, LogStore, StackKey};
pub use metrics::OutputMetrics;
pub use route::{
    BootstrapContext, ConfigChange, ErrorContext, EventKind, OutputContext, RenderScope,
    ReplayContext, Route, RouteBase, RouteConfig, Subscription,
};
pub use table::{TableData, TableRow, VALUE_COLUMN};
pub use throttle::{ErrorThrottle, ThrottleDecision};
pub use timestamp::{timestamp_title, TimestampFormat};
pub use value::{
    is_numeric_string, ArrayKey, ClassDefinition, ObjectValue, SerdeNormalizer, Value,
    ValueNormalizer, INF_TOKEN, NAN_TOKEN, NEG_INF_TOKEN, UNDEFINED_TOKEN,
};
