//! Browser console route
//!
//! Emits a `<script>` block that replays the log through `console.*` calls.

use super::{alert_console_method, encode_json, render_section, SCRIPT_TOKENS};
use crate::core::{
    LogEntry, Method, OutputContext, Result, Route, RouteBase, RouteConfig, Subscription,
    TableData, Value,
};

const CAPTION_STYLE: &str = "font-size:1.33em; font-weight:bold;";

#[derive(Debug, Clone, Default)]
pub struct ScriptConfig {
    pub route: RouteConfig,
    /// Label of the wrapping collapsed group; defaults to the request line
    pub heading: Option<String>,
}

impl ScriptConfig {
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

pub struct ScriptRoute {
    base: RouteBase,
    heading: Option<String>,
}

impl ScriptRoute {
    pub fn new(config: ScriptConfig) -> Self {
        Self {
            base: RouteBase::new("script", &config.route),
            heading: config.heading,
        }
    }

    fn call(method: &str, args: &[serde_json::Value]) -> Result<String> {
        let encoded = args
            .iter()
            .map(|arg| encode_json(arg, &SCRIPT_TOKENS))
            .collect::<Result<Vec<_>>>()?;
        Ok(format!("console.{}({});", method, encoded.join(", ")))
    }
}

impl Default for ScriptRoute {
    fn default() -> Self {
        Self::new(ScriptConfig::default())
    }
}

/// `console` method for an entry; unknown methods log
fn console_method(entry: &LogEntry) -> &str {
    match &entry.method {
        Method::Log
        | Method::Info
        | Method::Warn
        | Method::Error
        | Method::Assert
        | Method::Group
        | Method::GroupCollapsed
        | Method::GroupEnd
        | Method::Table => entry.method.as_str(),
        Method::Trace => "table",
        Method::Alert => alert_console_method(entry),
        _ => "log",
    }
}

impl Route for ScriptRoute {
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

        let mut lines = vec![Self::call(
            "groupCollapsed",
            &[serde_json::Value::String(heading)],
        )?];
        lines.extend(render_section(self, snapshot.alerts().iter(), &scope));
        lines.extend(render_section(self, snapshot.summary_entries(), &scope));
        lines.extend(render_section(self, snapshot.log().iter(), &scope));
        lines.push("console.groupEnd();".to_string());

        ctx.push_body(format!(
            "<script type=\"text/javascript\">\n{}\n</script>\n",
            escape_script_close(&lines.join("\n"))
        ));
        Ok(())
    }

    fn process_log_entry(&mut self, entry: &LogEntry) -> Result<Option<String>> {
        if matches!(entry.method, Method::GroupSummary | Method::GroupUncollapse) {
            return Ok(None);
        }
        let method = console_method(entry);

        if method == "table" {
            if let Some(table) = TableData::from_entry(entry) {
                let mut out = String::new();
                if let Some(caption) = &table.caption {
                    out.push_str(&Self::call(
                        "log",
                        &[
                            serde_json::Value::String(format!("%c{}", caption)),
                            serde_json::Value::String(CAPTION_STYLE.to_string()),
                        ],
                    )?);
                    out.push('\n');
                }
                out.push_str(&Self::call("table", &[table.to_json()])?);
                return Ok(Some(out));
            }
        }

        let mut args: Vec<serde_json::Value> = entry.args.iter().map(Value::to_json).collect();
        let method = match method {
            "table" => "log",
            "assert" => {
                args.insert(0, serde_json::Value::Bool(false));
                "assert"
            }
            other => other,
        };
        Ok(Some(Self::call(method, &args)?))
    }
}

/// `</script` (any case) becomes `<\/script`
pub(crate) fn escape_script_close(s: &str) -> String {
    let lower = s.to_ascii_lowercase();
    let mut out = String::with_capacity(s.len());
    let mut last = 0;
    for (idx, _) in lower.match_indices("</script") {
        out.push_str(&s[last..idx]);
        out.push_str("<\\/");
        last = idx + 2;
    }
    out.push_str(&s[last..]);
    out
}
