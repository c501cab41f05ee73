//! FirePHP (Wildfire JSON stream) header route
//!
//! Each message is `[meta, value]` JSON split across numbered
//! `X-Wf-1-1-1-N` headers of at most [`FIREPHP_CHUNK_SIZE`] bytes.

use super::{encode_json, render_section, JSON_TOKENS};
use crate::core::{
    LogEntry, Method, OutputContext, Result, Route, RouteBase, RouteConfig, Subscription,
    TableData, Value,
};
use serde_json::{json, Value as Json};
use std::collections::BTreeMap;

pub const FIREPHP_CHUNK_SIZE: usize = 5000;
/// Messages sent before the terminal warning replaces the rest
pub const FIREPHP_MESSAGE_LIMIT: usize = 99_999;

/// Wildfire's own spelling; `X-Wf-1-Protocol-1` is not read by the extension
const PROTOCOL_HEADER: &str = "X-Wf-Protocol-1";
const PROTOCOL_URI: &str = "http://meta.wildfirehq.org/Protocol/JsonStream/0.2";
const PLUGIN_URI: &str = "http://meta.firephp.org/Wildfire/Plugin/FirePHP/Library-FirePHPCore/0.3";
const STRUCTURE_URI: &str = "http://meta.firephp.org/Wildfire/Structure/FirePHP/FirebugConsole/0.1";
const LIMIT_MESSAGE: &str = "FirePhp's limit of 99,999 messages reached!";

#[derive(Debug, Clone, Default)]
pub struct FirePhpConfig {
    pub route: RouteConfig,
    /// Label of the wrapping collapsed group; defaults to the request line
    pub heading: Option<String>,
}

impl FirePhpConfig {
    #[must_use]
    pub fn with_route(mut self, route: RouteConfig) -> Self {
        self.route = route;
        self
    }

    #[must_use]
    pub fn with_heading(mut self, heading: impl Into<String>) -> Self {
        self.heading = Some(heading.into());
        self
    }
}

fn firephp_type(entry: &LogEntry) -> &'static str {
    match entry.method {
        Method::Info => "INFO",
        Method::Warn => "WARN",
        Method::Error => "ERROR",
        Method::Table | Method::Trace | Method::ProfileEnd => "TABLE",
        Method::Group | Method::GroupCollapsed => "GROUP_START",
        Method::GroupEnd => "GROUP_END",
        Method::Alert => match entry.meta.level() {
            Some("warn") => "WARN",
            Some("info") | Some("success") => "INFO",
            _ => "ERROR",
        },
        _ => "LOG",
    }
}

/// `[meta, value]` for one entry; meta keys are sorted
fn message(entry: &LogEntry) -> Option<Json> {
    if matches!(entry.method, Method::GroupSummary | Method::GroupUncollapse) {
        return None;
    }
    let kind = firephp_type(entry);
    let mut meta: BTreeMap<&str, Json> = BTreeMap::new();
    meta.insert("Type", json!(kind));
    if let Some(file) = entry.meta.file() {
        meta.insert("File", json!(file));
    }
    if let Some(line) = entry.meta.line() {
        meta.insert("Line", json!(line));
    }

    let value = match kind {
        "GROUP_START" => {
            meta.insert("Label", json!(entry.first_arg_text()));
            let collapsed = entry.method == Method::GroupCollapsed || entry.meta.collapsed();
            meta.insert("Collapsed", json!(collapsed.to_string()));
            Json::Null
        }
        "GROUP_END" => Json::Null,
        "TABLE" => match TableData::from_entry(entry) {
            Some(table) => {
                if let Some(caption) = &table.caption {
                    meta.insert("Label", json!(caption));
                }
                table.to_matrix()
            }
            None => args_value(&entry.args, &mut meta),
        },
        _ => args_value(&entry.args, &mut meta),
    };
    Some(json!([meta, value]))
}

/// A leading string label followed by one value becomes `Label`
fn args_value(args: &[Value], meta: &mut BTreeMap<&str, Json>) -> Json {
    match args {
        [] => Json::Null,
        [only] => only.to_json(),
        [Value::String(label), value] => {
            meta.insert("Label", json!(label));
            value.to_json()
        }
        _ => Json::Array(args.iter().map(Value::to_json).collect()),
    }
}

/// Header values for one message: `<len or empty>|<chunk>|<"\" unless last>`
///
/// Chunks hold at most `size` bytes and never split a UTF-8 sequence; only
/// the first carries the total byte length.
pub fn chunk_message(message: &str, size: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut rest = message;
    while rest.len() > size {
        let mut cut = size;
        while cut > 0 && !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        if cut == 0 {
            cut = rest.chars().next().map(char::len_utf8).unwrap_or(rest.len());
        }
        let (head, tail) = rest.split_at(cut);
        parts.push(head);
        rest = tail;
    }
    parts.push(rest);

    let last = parts.len() - 1;
    parts
        .iter()
        .enumerate()
        .map(|(idx, part)| {
            let len = if idx == 0 {
                message.len().to_string()
            } else {
                String::new()
            };
            let marker = if idx < last { "\\" } else { "" };
            format!("{}|{}|{}", len, part, marker)
        })
        .collect()
}

pub struct FirePhpRoute {
    base: RouteBase,
    heading: Option<String>,
    messages: Vec<String>,
}

impl FirePhpRoute {
    pub fn new(config: FirePhpConfig) -> Self {
        Self {
            base: RouteBase::new("firephp", &config.route),
            heading: config.heading,
            messages: Vec::new(),
        }
    }

    fn encode(message: &Json) -> Result<String> {
        encode_json(message, &JSON_TOKENS)
    }
}

impl Default for FirePhpRoute {
    fn default() -> Self {
        Self::new(FirePhpConfig::default())
    }
}

impl Route for FirePhpRoute {
    fn base(&self) -> &RouteBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RouteBase {
        &mut self.base
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        vec![Subscription::output()]
    }

    fn process_log_entries(&mut self, ctx: &mut OutputContext<'_>) -> Result<()> {
        let snapshot = ctx.snapshot;
        let scope = ctx.scope;
        let heading = self
            .heading
            .clone()
            .unwrap_or_else(|| ctx.env.request_line());

        self.messages.clear();
        self.messages.push(Self::encode(&json!([
            {"Collapsed": "true", "Label": heading, "Type": "GROUP_START"},
            null
        ]))?);
        render_section(self, snapshot.alerts().iter(), &scope);
        render_section(self, snapshot.summary_entries(), &scope);
        render_section(self, snapshot.log().iter(), &scope);
        self.messages
            .push(Self::encode(&json!([{"Type": "GROUP_END"}, null]))?);

        ctx.add_header(PROTOCOL_HEADER, PROTOCOL_URI);
        ctx.add_header("X-Wf-1-Plugin-1", PLUGIN_URI);
        ctx.add_header("X-Wf-1-Structure-1", STRUCTURE_URI);

        let mut index = 0usize;
        for message in std::mem::take(&mut self.messages) {
            let chunks = chunk_message(&message, FIREPHP_CHUNK_SIZE);
            if index + chunks.len() > FIREPHP_MESSAGE_LIMIT {
                let warning = Self::encode(&json!([{"Type": "WARN"}, LIMIT_MESSAGE]))?;
                index += 1;
                ctx.add_header(
                    format!("X-Wf-1-1-1-{}", index),
                    format!("{}|{}|", warning.len(), warning),
                );
                tracing::warn!(route = self.name(), limit = FIREPHP_MESSAGE_LIMIT, "message limit reached");
                break;
            }
            for chunk in chunks {
                index += 1;
                ctx.add_header(format!("X-Wf-1-1-1-{}", index), chunk);
            }
        }
        ctx.add_header("X-Wf-1-Index", index.to_string());
        Ok(())
    }

    fn process_log_entry(&mut self, entry: &LogEntry) -> Result<Option<String>> {
        // past the cap nothing more is sent, so skip the encoding work
        if self.messages.len() > FIREPHP_MESSAGE_LIMIT {
            return Ok(None);
        }
        if let Some(message) = message(entry) {
            self.messages.push(Self::encode(&message)?);
        }
        Ok(None)
    }
}
