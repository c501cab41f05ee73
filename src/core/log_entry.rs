//! Log entry structure

use super::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// The console method an entry was recorded with
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Method {
    Log,
    Info,
    Warn,
    Error,
    Assert,
    Clear,
    Count,
    CountReset,
    Group,
    GroupCollapsed,
    GroupEnd,
    GroupSummary,
    GroupUncollapse,
    Table,
    Trace,
    Time,
    TimeLog,
    TimeEnd,
    Profile,
    ProfileEnd,
    Alert,
    Custom(String),
}

impl Method {
    pub fn as_str(&self) -> &str {
        match self {
            Method::Log => "log",
            Method::Info => "info",
            Method::Warn => "warn",
            Method::Error => "error",
            Method::Assert => "assert",
            Method::Clear => "clear",
            Method::Count => "count",
            Method::CountReset => "countReset",
            Method::Group => "group",
            Method::GroupCollapsed => "groupCollapsed",
            Method::GroupEnd => "groupEnd",
            Method::GroupSummary => "groupSummary",
            Method::GroupUncollapse => "groupUncollapse",
            Method::Table => "table",
            Method::Trace => "trace",
            Method::Time => "time",
            Method::TimeLog => "timeLog",
            Method::TimeEnd => "timeEnd",
            Method::Profile => "profile",
            Method::ProfileEnd => "profileEnd",
            Method::Alert => "alert",
            Method::Custom(name) => name,
        }
    }

    /// `group` or `groupCollapsed`
    pub fn opens_group(&self) -> bool {
        matches!(self, Method::Group | Method::GroupCollapsed)
    }

    /// Methods whose first argument is rendered as a table
    pub fn is_tabular(&self) -> bool {
        matches!(self, Method::Table | Method::Trace | Method::ProfileEnd)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "log" => Method::Log,
            "info" => Method::Info,
            "warn" => Method::Warn,
            "error" => Method::Error,
            "assert" => Method::Assert,
            "clear" => Method::Clear,
            "count" => Method::Count,
            "countReset" => Method::CountReset,
            "group" => Method::Group,
            "groupCollapsed" => Method::GroupCollapsed,
            "groupEnd" => Method::GroupEnd,
            "groupSummary" => Method::GroupSummary,
            "groupUncollapse" => Method::GroupUncollapse,
            "table" => Method::Table,
            "trace" => Method::Trace,
            "time" => Method::Time,
            "timeLog" => Method::TimeLog,
            "timeEnd" => Method::TimeEnd,
            "profile" => Method::Profile,
            "profileEnd" => Method::ProfileEnd,
            "alert" => Method::Alert,
            other => Method::Custom(other.to_string()),
        })
    }
}

impl From<String> for Method {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(method) => method,
            Err(never) => match never {},
        }
    }
}

impl From<&str> for Method {
    fn from(s: &str) -> Self {
        Method::from(s.to_string())
    }
}

impl From<Method> for String {
    fn from(method: Method) -> Self {
        method.as_str().to_string()
    }
}

/// Open, key-sorted metadata bag with typed accessors
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Meta {
    values: BTreeMap<String, Value>,
}

impl Meta {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Merge `other` over `self`
    pub fn extend(&mut self, other: Meta) {
        self.values.extend(other.values);
    }

    fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    fn get_bool(&self, key: &str, default: bool) -> bool {
        self.values
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(default)
    }

    pub fn file(&self) -> Option<&str> {
        self.get_str("file")
    }

    pub fn line(&self) -> Option<i64> {
        self.values.get("line").and_then(Value::as_i64)
    }

    pub fn channel(&self) -> Option<&str> {
        self.get_str("channel")
    }

    /// Alert / entry level (`error`, `info`, `success`, `warn`)
    pub fn level(&self) -> Option<&str> {
        self.get_str("level")
    }

    pub fn caption(&self) -> Option<&str> {
        self.get_str("caption")
    }

    /// Explicit column list for tabular methods
    pub fn columns(&self) -> Option<Vec<String>> {
        self.values.get("columns").and_then(|v| {
            v.as_array().map(|items| {
                items
                    .iter()
                    .map(|(_, col)| col.to_text())
                    .collect::<Vec<_>>()
            })
        })
    }

    pub fn sortable(&self) -> bool {
        self.get_bool("sortable", true)
    }

    pub fn detect_files(&self) -> bool {
        self.get_bool("detectFiles", false)
    }

    /// Escape arguments (HTML route); defaults to true
    pub fn sanitize(&self) -> bool {
        self.get_bool("sanitize", true)
    }

    /// Escape the first argument; defaults to [`Meta::sanitize`]
    pub fn sanitize_first(&self) -> bool {
        self.get_bool("sanitizeFirst", self.sanitize())
    }

    /// Extra HTML attributes for the rendered element
    pub fn attribs(&self) -> Vec<(String, String)> {
        match self.values.get("attribs").and_then(Value::as_array) {
            Some(items) => items
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_text()))
                .collect(),
            None => Vec::new(),
        }
    }

    /// `false` when the entry must not be rendered
    pub fn output(&self) -> bool {
        self.get_bool("output", true)
    }

    pub fn set_output(&mut self, output: bool) {
        self.set("output", output);
    }

    /// Pre-rendered output set by an interceptor
    pub fn return_value(&self) -> Option<&str> {
        self.get_str("return")
    }

    pub fn set_return_value(&mut self, output: impl Into<String>) {
        self.set("return", output.into());
    }

    pub fn dismissible(&self) -> bool {
        self.get_bool("dismissible", false)
    }

    /// Render a group collapsed regardless of its method
    pub fn collapsed(&self) -> bool {
        self.get_bool("collapsed", false)
    }

    pub fn priority(&self) -> Option<i64> {
        self.values.get("priority").and_then(Value::as_i64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Fully qualified (dot separated) channel name of the owning channel
    pub channel: String,
    pub method: Method,
    pub args: Vec<Value>,
    #[serde(default, skip_serializing_if = "Meta::is_empty")]
    pub meta: Meta,
}

impl LogEntry {
    pub fn new(channel: impl Into<String>, method: impl Into<Method>, args: Vec<Value>) -> Self {
        Self {
            channel: channel.into(),
            method: method.into(),
            args,
            meta: Meta::new(),
        }
    }

    #[must_use]
    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta.extend(meta);
        self
    }

    #[must_use]
    pub fn with_location(mut self, file: &str, line: u32) -> Self {
        self.meta.set("file", file);
        self.meta.set("line", line);
        self
    }

    /// Channel used for filtering: `meta.channel` overrides the owning channel
    pub fn channel_name(&self) -> &str {
        self.meta.channel().unwrap_or(&self.channel)
    }

    /// First argument as text (group label, alert message, ...)
    pub fn first_arg_text(&self) -> String {
        self.args.first().map(Value::to_text).unwrap_or_default()
    }

    /// `"file: line"` when both are known
    pub fn file_line(&self) -> Option<String> {
        match (self.meta.file(), self.meta.line()) {
            (Some(file), Some(line)) => Some(format!("{}: {}", file, line)),
            (Some(file), None) => Some(file.to_string()),
            _ => None,
        }
    }
}
