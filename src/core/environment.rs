//! Request / environment context
//!
//! The console never inspects the host process directly: request method,
//! URI, server parameters and environment variables are all read through the
//! [`Environment`] trait so every console stays scoped to one logical request.

use super::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Replacement text for redacted values
pub const REDACT_REPLACEMENT: &str = "█████████";

const REDACT_MARKERS: [&str; 6] = ["PASSWORD", "PASSWD", "SECRET", "TOKEN", "AUTH", "COOKIE"];

/// How the current request reached the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interface {
    #[default]
    Http,
    Cli,
}

impl Interface {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interface::Http => "http",
            Interface::Cli => "cli",
        }
    }
}

/// One stack frame
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TraceFrame {
    pub file: String,
    pub line: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
}

impl TraceFrame {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
            function: None,
        }
    }

    #[must_use]
    pub fn with_function(mut self, function: impl Into<String>) -> Self {
        self.function = Some(function.into());
        self
    }
}

/// Table value (`file`, `line`, `function` columns) for a backtrace
pub fn trace_to_value(frames: &[TraceFrame]) -> Value {
    Value::list(frames.iter().map(|frame| {
        Value::map(vec![
            ("file", Value::from(frame.file.as_str())),
            ("line", Value::from(frame.line)),
            ("function", Value::from(frame.function.clone())),
        ])
    }))
}

pub trait Environment: Send + Sync {
    /// HTTP method, `None` on the command line
    fn request_method(&self) -> Option<String>;

    /// Request URI (or command line)
    fn request_uri(&self) -> Option<String>;

    fn interface(&self) -> Interface;

    /// Unique id of this request
    fn request_id(&self) -> &str;

    /// Raw server parameters (headers, CGI vars, ...)
    fn server_params(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    fn env_var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    /// HTTP status code of the response being built
    fn response_code(&self) -> Option<u16> {
        None
    }

    /// Current call stack, innermost first
    fn backtrace(&self) -> Vec<TraceFrame> {
        Vec::new()
    }

    /// `"GET /path"` for HTTP, `"$ command"` for the command line
    fn request_line(&self) -> String {
        match self.interface() {
            Interface::Cli => format!("$ {}", self.request_uri().unwrap_or_default()),
            Interface::Http => format!(
                "{} {}",
                self.request_method().unwrap_or_else(|| "GET".to_string()),
                self.request_uri().unwrap_or_else(|| "/".to_string())
            ),
        }
    }

    /// Server parameters with credentials replaced
    fn redacted_server_params(&self) -> BTreeMap<String, String> {
        redact_params(self.server_params())
    }
}

pub fn redact_params(params: BTreeMap<String, String>) -> BTreeMap<String, String> {
    params
        .into_iter()
        .map(|(key, value)| {
            let upper = key.to_uppercase();
            if REDACT_MARKERS.iter().any(|marker| upper.contains(marker)) {
                (key, REDACT_REPLACEMENT.to_string())
            } else {
                (key, value)
            }
        })
        .collect()
}

/// Fixed environment, built up front by the host
#[derive(Debug, Clone)]
pub struct StaticEnvironment {
    request_method: Option<String>,
    request_uri: Option<String>,
    interface: Interface,
    request_id: String,
    server_params: BTreeMap<String, String>,
    env_vars: Option<BTreeMap<String, String>>,
    response_code: Option<u16>,
    backtrace: Vec<TraceFrame>,
}

impl StaticEnvironment {
    pub fn http(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            request_method: Some(method.into()),
            request_uri: Some(uri.into()),
            ..Self::default()
        }
    }

    pub fn cli(command: impl Into<String>) -> Self {
        Self {
            request_method: None,
            request_uri: Some(command.into()),
            interface: Interface::Cli,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    #[must_use]
    pub fn with_server_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.server_params.insert(key.into(), value.into());
        self
    }

    /// Use a fixed variable set instead of the process environment
    #[must_use]
    pub fn with_env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Hide the process environment entirely
    #[must_use]
    pub fn isolated(mut self) -> Self {
        self.env_vars.get_or_insert_with(BTreeMap::new);
        self
    }

    #[must_use]
    pub fn with_response_code(mut self, code: u16) -> Self {
        self.response_code = Some(code);
        self
    }

    #[must_use]
    pub fn with_backtrace(mut self, frames: Vec<TraceFrame>) -> Self {
        self.backtrace = frames;
        self
    }
}

impl Default for StaticEnvironment {
    fn default() -> Self {
        Self {
            request_method: Some("GET".to_string()),
            request_uri: Some("/".to_string()),
            interface: Interface::Http,
            request_id: format!("{:016x}", rand::random::<u64>()),
            server_params: BTreeMap::new(),
            env_vars: None,
            response_code: None,
            backtrace: Vec::new(),
        }
    }
}

impl Environment for StaticEnvironment {
    fn request_method(&self) -> Option<String> {
        self.request_method.clone()
    }

    fn request_uri(&self) -> Option<String> {
        self.request_uri.clone()
    }

    fn interface(&self) -> Interface {
        self.interface
    }

    fn request_id(&self) -> &str {
        &self.request_id
    }

    fn server_params(&self) -> BTreeMap<String, String> {
        self.server_params.clone()
    }

    fn env_var(&self, name: &str) -> Option<String> {
        match &self.env_vars {
            Some(vars) => vars.get(name).cloned(),
            None => std::env::var(name).ok(),
        }
    }

    fn response_code(&self) -> Option<u16> {
        self.response_code
    }

    fn backtrace(&self) -> Vec<TraceFrame> {
        self.backtrace.clone()
    }
}
