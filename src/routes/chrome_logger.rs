//! ChromeLogger header route
//!
//! The whole pass becomes one `{version, columns, rows}` document, base64
//! encoded into a single response header. Rows are `[args, backtrace, type]`.

use super::{alert_console_method, encode_json, render_section, JSON_TOKENS};
use crate::core::{
    LogEntry, Method, OutputContext, Result, Route, RouteBase, RouteConfig, Subscription,
    TableData, Value,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value as Json};

pub const CHROME_LOGGER_HEADER: &str = "X-ChromeLogger-Data";
/// Largest encoded header value that is still sent
pub const CHROME_LOGGER_MAX_BYTES: usize = 250_000;

const COLUMNS: [&str; 3] = ["log", "backtrace", "type"];

#[derive(Debug, Clone)]
pub struct ChromeLoggerConfig {
    pub route: RouteConfig,
    /// Label of the wrapping collapsed group; defaults to the request line
    pub heading: Option<String>,
    pub max_bytes: usize,
}

impl Default for ChromeLoggerConfig {
    fn default() -> Self {
        Self {
            route: RouteConfig::default(),
            heading: None,
            max_bytes: CHROME_LOGGER_MAX_BYTES,
        }
    }
}

impl ChromeLoggerConfig {
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

    #[must_use]
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

/// Row `type` column; empty for plain log calls
fn row_type(entry: &LogEntry) -> &str {
    match &entry.method {
        Method::Info
        | Method::Warn
        | Method::Error
        | Method::Assert
        | Method::Group
        | Method::GroupCollapsed
        | Method::GroupEnd
        | Method::Table => entry.method.as_str(),
        Method::Trace | Method::ProfileEnd => "table",
        Method::Alert => alert_console_method(entry),
        _ => "",
    }
}

/// One `[args, backtrace, type]` row; `None` for entries with no visible form
pub(crate) fn chrome_row(entry: &LogEntry) -> Option<Json> {
    if matches!(entry.method, Method::GroupSummary | Method::GroupUncollapse) {
        return None;
    }
    let kind = row_type(entry);
    let args: Vec<Json> = match TableData::from_entry(entry) {
        Some(table) if kind == "table" => vec![table.to_json()],
        _ => {
            let mut args: Vec<Json> = entry.args.iter().map(Value::to_json).collect();
            if entry.method == Method::Assert {
                args.insert(0, Json::Bool(false));
            }
            args
        }
    };
    let backtrace = entry.file_line().map(Json::String).unwrap_or(Json::Null);
    Some(json!([args, backtrace, kind]))
}

/// The full document, wrapped in a collapsed group labelled `heading`
pub(crate) fn chrome_document(heading: &str, rows: Vec<Json>) -> Json {
    let mut all = Vec::with_capacity(rows.len() + 2);
    all.push(json!([[heading], Json::Null, "groupCollapsed"]));
    all.extend(rows);
    all.push(json!([[], Json::Null, "groupEnd"]));
    json!({
        "version": env!("CARGO_PKG_VERSION"),
        "columns": COLUMNS,
        "rows": all,
    })
}

pub struct ChromeLoggerRoute {
    base: RouteBase,
    heading: Option<String>,
    max_bytes: usize,
    rows: Vec<Json>,
}

impl ChromeLoggerRoute {
    pub fn new(config: ChromeLoggerConfig) -> Self {
        Self {
            base: RouteBase::new("chromeLogger", &config.route),
            heading: config.heading,
            max_bytes: config.max_bytes,
            rows: Vec::new(),
        }
    }
}

impl Default for ChromeLoggerRoute {
    fn default() -> Self {
        Self::new(ChromeLoggerConfig::default())
    }
}

impl Route for ChromeLoggerRoute {
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
        self.rows.clear();

        // rows are buffered by process_log_entry; interceptor output has no row form
        render_section(self, snapshot.alerts().iter(), &scope);
        render_section(self, snapshot.summary_entries(), &scope);
        render_section(self, snapshot.log().iter(), &scope);

        let heading = self
            .heading
            .clone()
            .unwrap_or_else(|| ctx.env.request_line());
        let document = chrome_document(&heading, std::mem::take(&mut self.rows));
        let encoded = STANDARD.encode(encode_json(&document, &JSON_TOKENS)?);

        if encoded.len() > self.max_bytes {
            tracing::warn!(
                route = self.name(),
                bytes = encoded.len(),
                limit = self.max_bytes,
                "header payload too large, skipped"
            );
            ctx.warn("chromeLogger: output limit exceeded");
            return Ok(());
        }
        ctx.add_header(CHROME_LOGGER_HEADER, encoded);
        Ok(())
    }

    fn process_log_entry(&mut self, entry: &LogEntry) -> Result<Option<String>> {
        if let Some(row) = chrome_row(entry) {
            self.rows.push(row);
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AlertLevel, Console, Meta, StaticEnvironment};

    fn decode(header: &str) -> Json {
        let bytes = STANDARD.decode(header).unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_row_shapes() {
        let entry = LogEntry::new("general", Method::Log, vec![Value::from("a"), Value::Undefined])
            .with_location("/app/a.rs", 3);
        let row = chrome_row(&entry).unwrap();
        assert_eq!(row[1], "/app/a.rs: 3");
        assert_eq!(row[2], "");

        let alert = LogEntry::new("general", Method::Alert, vec![Value::from("x")])
            .with_meta(Meta::new().with("level", "success"));
        assert_eq!(chrome_row(&alert).unwrap()[2], "info");

        let trace = LogEntry::new(
            "general",
            Method::Trace,
            vec![Value::list(vec![Value::map(vec![("file", "a.rs")])])],
        );
        let row = chrome_row(&trace).unwrap();
        assert_eq!(row[2], "table");
        assert_eq!(row[0][0][0]["file"], "a.rs");

        let summary = LogEntry::new("general", Method::GroupSummary, vec![]);
        assert!(chrome_row(&summary).is_none());
    }

    #[test]
    fn test_header_round_trip() {
        let mut console = Console::builder()
            .environment(StaticEnvironment::http("GET", "/x"))
            .route(ChromeLoggerRoute::default())
            .build();
        console.alert("warned", AlertLevel::Warn);
        console.group(vec![Value::from("g")]);
        console.log(vec![Value::from("u"), Value::Undefined]);

        let output = console.output();
        let doc = decode(output.header(CHROME_LOGGER_HEADER).unwrap());
        assert_eq!(doc["columns"], json!(["log", "backtrace", "type"]));

        let rows = doc["rows"].as_array().unwrap();
        let types: Vec<&str> = rows.iter().map(|r| r[2].as_str().unwrap()).collect();
        assert_eq!(
            types,
            vec!["groupCollapsed", "warn", "group", "", "groupEnd", "groupEnd"]
        );
        assert_eq!(rows[0][0][0], "GET /x");
        assert_eq!(rows[3][0], json!(["u", null]));
    }

    #[test]
    fn test_limit_exceeded() {
        let mut console = Console::builder()
            .route(ChromeLoggerRoute::new(ChromeLoggerConfig::default().with_max_bytes(64)))
            .build();
        console.log(vec![Value::from("x".repeat(200))]);

        let output = console.output();
        assert!(output.header(CHROME_LOGGER_HEADER).is_none());
        let log = console.store().log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].method, Method::Warn);
        assert_eq!(log[0].first_arg_text(), "chromeLogger: output limit exceeded");
    }
}
