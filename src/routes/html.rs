//! HTML panel route
//!
//! Produces one self-contained fragment: a menu bar, the alerts, the summary
//! list and the main log list. Client-side script uses `data-channels` (a
//! nested object of the dot-separated channel names that were rendered) to
//! build its channel picker.

use super::{arg_glue, render_section};
use crate::core::{
    timestamp_title, trace_to_value, ErrorSummary, LogEntry, Method, OutputContext, Result, Route,
    RouteBase, RouteConfig, Subscription, TableData, Value,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

const FORMAT_DIRECTIVES: [char; 7] = ['s', 'd', 'i', 'f', 'o', 'O', 'c'];

#[derive(Debug, Clone)]
pub struct HtmlConfig {
    pub route: RouteConfig,
    /// Prepend the error summary alert when errors occurred
    pub error_summary: bool,
}

impl Default for HtmlConfig {
    fn default() -> Self {
        Self {
            route: RouteConfig::default(),
            error_summary: true,
        }
    }
}

impl HtmlConfig {
    #[must_use]
    pub fn with_route(mut self, route: RouteConfig) -> Self {
        self.route = route;
        self
    }

    #[must_use]
    pub fn with_error_summary(mut self, enabled: bool) -> Self {
        self.error_summary = enabled;
        self
    }
}

pub struct HtmlRoute {
    base: RouteBase,
    config: HtmlConfig,
    now: DateTime<Utc>,
    channels: BTreeSet<String>,
}

impl HtmlRoute {
    pub fn new(config: HtmlConfig) -> Self {
        Self {
            base: RouteBase::new("html", &config.route),
            config,
            now: Utc::now(),
            channels: BTreeSet::new(),
        }
    }

    fn render_alert(&self, entry: &LogEntry) -> String {
        let level = match entry.meta.level() {
            Some("warn") => "warning",
            Some(level) => level,
            None => "error",
        };
        let dismiss = if entry.meta.dismissible() {
            r#"<button type="button" class="close" data-dismiss="alert" aria-label="Close"><span aria-hidden="true">&times;</span></button>"#
        } else {
            ""
        };
        format!(
            r#"<div class="alert-{}" role="alert"{}>{}{}</div>"#,
            escape_html(level),
            channel_attr(entry),
            dismiss,
            self.render_args(entry)
        )
    }

    fn render_group(&self, entry: &LogEntry) -> String {
        let state = if entry.method == Method::Group && !entry.meta.collapsed() {
            "expanded"
        } else {
            "collapsed"
        };
        let label = entry.first_arg_text();
        let rest = entry.args.get(1..).unwrap_or(&[]);
        let label_html = format!(
            r#"<span class="group-label">{}</span>"#,
            escape_if(&label, entry.meta.sanitize_first())
        );
        let header = if rest.is_empty() {
            label_html
        } else {
            let values: Vec<String> = rest
                .iter()
                .map(|arg| self.dump(arg, entry.meta.sanitize()))
                .collect();
            if label.ends_with(':') || label.ends_with('=') {
                format!("{} {}", label_html, values.join(", "))
            } else {
                format!(
                    r#"{}<span class="t_punct">(</span>{}<span class="t_punct">)</span>"#,
                    label_html,
                    values.join(r#"<span class="t_punct">,</span> "#)
                )
            }
        };
        format!(
            r#"<li{}><div class="group-header">{}</div><ul class="group-body">"#,
            li_attrs(entry, &format!("m_group {}", state)),
            header
        )
    }

    fn render_table(&self, entry: &LogEntry) -> Option<String> {
        let table = TableData::from_entry(entry)?;
        let mut html = String::new();
        let class = if entry.meta.sortable() {
            "table-bordered sortable"
        } else {
            "table-bordered"
        };
        html.push_str(&format!(r#"<table class="{}">"#, class));
        if let Some(caption) = &table.caption {
            html.push_str(&format!("<caption>{}</caption>", escape_html(caption)));
        }
        html.push_str("<thead><tr><th>&nbsp;</th>");
        for column in &table.columns {
            html.push_str(&format!("<th>{}</th>", escape_html(column)));
        }
        html.push_str("</tr></thead><tbody>");
        for row in &table.rows {
            html.push_str(&format!(
                r#"<tr><th class="t_key text-right">{}</th>"#,
                escape_html(&row.key.to_string())
            ));
            for cell in &row.cells {
                match cell {
                    Some(value) => html.push_str(&format!(
                        "<td>{}</td>",
                        self.dump(value, entry.meta.sanitize())
                    )),
                    None => html.push_str(r#"<td class="t_undefined"></td>"#),
                }
            }
            html.push_str("</tr>");
        }
        html.push_str("</tbody></table>");

        let class = format!("m_{}", entry.method);
        Some(format!("<li{}>{}</li>", li_attrs(entry, &class), html))
    }

    fn render_default(&self, entry: &LogEntry) -> String {
        let class = format!("m_{}", entry.method);
        format!("<li{}>{}</li>", li_attrs(entry, &class), self.render_args(entry))
    }

    fn render_args(&self, entry: &LogEntry) -> String {
        let args = &entry.args;
        let sanitize = entry.meta.sanitize();

        if let Some(Value::String(first)) = args.first() {
            if has_format_directive(first) {
                let (html, consumed) = self.substitute(first, &args[1..], sanitize);
                let mut out = format!(r#"<span class="no-quotes t_string">{}</span>"#, html);
                let rest: Vec<String> = args[1 + consumed..]
                    .iter()
                    .map(|arg| self.dump(arg, sanitize))
                    .collect();
                if !rest.is_empty() {
                    out.push(' ');
                    out.push_str(&rest.join(", "));
                }
                return out;
            }
        }

        let glue = arg_glue(args);
        args.iter()
            .enumerate()
            .map(|(idx, arg)| match (idx, arg) {
                (0, Value::String(s)) => format!(
                    r#"<span class="no-quotes t_string">{}</span>"#,
                    escape_if(s, entry.meta.sanitize_first())
                ),
                _ => self.dump(arg, sanitize),
            })
            .collect::<Vec<_>>()
            .join(glue)
    }

    /// Apply `%s %d %i %f %o %O %c` directives; returns html and args consumed
    fn substitute(&self, format: &str, args: &[Value], sanitize: bool) -> (String, usize) {
        let mut out = String::with_capacity(format.len());
        let mut consumed = 0;
        let mut span_open = false;
        let mut chars = format.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '%' {
                out.push(c);
                continue;
            }
            let directive = match chars.peek() {
                Some('%') => {
                    chars.next();
                    out.push('%');
                    continue;
                }
                Some(d) if FORMAT_DIRECTIVES.contains(d) => *d,
                _ => {
                    out.push('%');
                    continue;
                }
            };
            let Some(arg) = args.get(consumed) else {
                out.push('%');
                continue;
            };
            chars.next();
            consumed += 1;

            match directive {
                's' => out.push_str(&escape_if(&arg.to_text(), sanitize)),
                'd' | 'i' => {
                    let n = arg.as_number().map(|n| n.trunc() as i64).unwrap_or(0);
                    out.push_str(&self.dump(&Value::Int(n), sanitize));
                }
                'f' => {
                    let n = arg.as_number().unwrap_or(0.0);
                    out.push_str(&self.dump(&Value::Float(n), sanitize));
                }
                'c' => {
                    if span_open {
                        out.push_str("</span>");
                    }
                    out.push_str(&format!(
                        r#"<span style="{}">"#,
                        escape_html(&arg.to_text())
                    ));
                    span_open = true;
                }
                _ => out.push_str(&self.dump(arg, sanitize)),
            }
        }
        if span_open {
            out.push_str("</span>");
        }
        (out, consumed)
    }

    /// Type-aware dump of one value
    fn dump(&self, value: &Value, sanitize: bool) -> String {
        match value {
            Value::Undefined => r#"<span class="t_undefined"></span>"#.to_string(),
            Value::Null => r#"<span class="t_null">null</span>"#.to_string(),
            Value::Bool(b) => format!(r#"<span class="t_bool">{}</span>"#, b),
            Value::Int(i) => self.with_timestamp(
                format!(r#"<span class="t_int">{}</span>"#, i),
                *i as f64,
            ),
            Value::Float(f) => self.with_timestamp(
                format!(r#"<span class="t_float">{}</span>"#, value.to_text()),
                *f,
            ),
            Value::String(s) => {
                let numeric = crate::core::is_numeric_string(s);
                let class = if numeric { "t_string numeric" } else { "t_string" };
                let html = format!(r#"<span class="{}">{}</span>"#, class, escape_if(s, sanitize));
                match value.as_number() {
                    Some(n) if numeric => self.with_timestamp(html, n),
                    _ => html,
                }
            }
            Value::Array(items) if items.is_empty() => {
                r#"<span class="t_array"><span class="t_keyword">array</span><span class="t_punct">()</span></span>"#
                    .to_string()
            }
            Value::Array(items) => {
                let inner: String = items
                    .iter()
                    .map(|(key, v)| {
                        format!(
                            r#"<li><span class="t_key">{}</span><span class="t_operator">=&gt;</span>{}</li>"#,
                            escape_html(&key.to_string()),
                            self.dump(v, sanitize)
                        )
                    })
                    .collect();
                format!(
                    r#"<span class="t_array"><span class="t_keyword">array</span><span class="t_punct">(</span><ul class="array-inner list-unstyled">{}</ul><span class="t_punct">)</span></span>"#,
                    inner
                )
            }
            Value::Object(obj) => {
                let mut inner = String::new();
                if !obj.extends.is_empty() {
                    inner.push_str(r#"<dt>extends</dt>"#);
                    for parent in &obj.extends {
                        inner.push_str(&format!(
                            r#"<dd class="extends"><span class="t_classname">{}</span></dd>"#,
                            escape_html(parent)
                        ));
                    }
                }
                if !obj.implements.is_empty() {
                    inner.push_str(r#"<dt>implements</dt>"#);
                    for interface in &obj.implements {
                        inner.push_str(&format!(
                            r#"<dd class="interface"><span class="t_classname">{}</span></dd>"#,
                            escape_html(interface)
                        ));
                    }
                }
                inner.push_str(r#"<dt class="properties">properties</dt>"#);
                for (name, v) in &obj.properties {
                    inner.push_str(&format!(
                        r#"<dd class="property"><span class="t_identifier">{}</span> <span class="t_operator">=</span> {}</dd>"#,
                        escape_html(name),
                        self.dump(v, sanitize)
                    ));
                }
                if !obj.methods.is_empty() {
                    inner.push_str(r#"<dt class="methods">methods</dt>"#);
                    for method in &obj.methods {
                        inner.push_str(&format!(
                            r#"<dd class="method"><span class="t_identifier">{}</span><span class="t_punct">()</span></dd>"#,
                            escape_html(method)
                        ));
                    }
                }
                format!(
                    r#"<div class="t_object"><span class="t_classname">{}</span><dl class="object-inner">{}</dl></div>"#,
                    escape_html(&obj.class_name),
                    inner
                )
            }
            Value::Resource(desc) => {
                format!(r#"<span class="t_resource">{}</span>"#, escape_html(desc))
            }
            Value::Callable(name) => {
                format!(r#"<span class="t_callable">{}</span>"#, escape_html(name))
            }
        }
    }

    fn with_timestamp(&self, html: String, seconds: f64) -> String {
        match timestamp_title(seconds, &self.now) {
            Some(title) => format!(
                r#"<span class="timestamp value-container" title="{}">{}</span>"#,
                escape_html(&title),
                html
            ),
            None => html,
        }
    }

    fn error_summary(&self, errors: &ErrorSummary, channel: &str) -> Option<String> {
        if !errors.has_errors() {
            return None;
        }
        let severe = errors
            .counts()
            .iter()
            .any(|(category, count)| category.is_error() && count.total() > 0);
        let class = if severe { "alert-error" } else { "alert-warning" };

        let mut html = format!(r#"<div class="{} error-summary" role="alert">"#, class);
        if errors.in_console() > 0 {
            html.push_str(r#"<h3>Errors</h3><ul class="list-unstyled in-console">"#);
            for (category, count) in errors.counts() {
                if count.in_console > 0 {
                    html.push_str(&format!(
                        r#"<li class="error-{}">{}: {}</li>"#,
                        category,
                        category,
                        count.in_console
                    ));
                }
            }
            html.push_str("</ul>");
        }
        if errors.not_in_console() > 0 {
            let n = errors.not_in_console();
            html.push_str(&format!(
                r#"<p class="not-in-console">{} {} not logged in console</p>"#,
                n,
                if n == 1 { "error was" } else { "errors were" }
            ));
        }
        if let Some(last) = errors.last().filter(|e| e.is_fatal()) {
            html.push_str(&format!(
                r#"<div class="error-fatal"><h3>Fatal Error</h3><p>{}</p><p class="file-line">{}</p>"#,
                escape_html(&last.message),
                escape_html(&last.location())
            ));
            if !last.backtrace.is_empty() {
                let trace = LogEntry::new(channel, Method::Trace, vec![trace_to_value(&last.backtrace)]);
                if let Some(table) = self.render_table(&trace) {
                    html.push_str(&format!(
                        r#"<ul class="list-unstyled"><li class="m_trace"{}>{}</li></ul>"#,
                        channel_attr(&trace),
                        table
                    ));
                }
            }
            html.push_str("</div>");
        }
        html.push_str("</div>");
        Some(html)
    }
}

impl Default for HtmlRoute {
    fn default() -> Self {
        Self::new(HtmlConfig::default())
    }
}

impl Route for HtmlRoute {
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
        self.now = Utc::now();
        self.channels.clear();
        self.channels.insert(ctx.channel.to_string());

        let mut alerts = String::new();
        if self.config.error_summary {
            if let Some(summary) = self.error_summary(ctx.errors, ctx.channel) {
                alerts.push_str(&summary);
            }
        }
        alerts.push_str(&render_section(self, snapshot.alerts().iter(), &scope).concat());
        let summary = render_section(self, snapshot.summary_entries(), &scope).concat();
        let log = render_section(self, snapshot.log().iter(), &scope).concat();

        let tree = serde_json::to_string(&channel_tree(&self.channels))?;
        let html = format!(
            concat!(
                r#"<div class="debug" data-channel-name-root="{root}" data-channels='{tree}'>"#,
                r#"<div class="debug-menubar"><nav role="tablist">"#,
                r#"<a class="active" data-target=".debug-tab-log" role="tab">Log</a>"#,
                r#"</nav></div>"#,
                r#"<div class="debug-tabs"><div class="active debug-tab-log tab-pane" role="tabpanel"><div class="tab-body">"#,
                r#"{alerts}"#,
                r#"<ul class="debug-log-summary group-body">{summary}</ul>"#,
                r#"<ul class="debug-log group-body">{log}</ul>"#,
                r#"</div></div></div></div>"#
            ),
            root = escape_html(ctx.channel),
            tree = escape_html(&tree),
            alerts = alerts,
            summary = summary,
            log = log,
        );
        ctx.push_body(html);
        Ok(())
    }

    fn process_log_entry(&mut self, entry: &LogEntry) -> Result<Option<String>> {
        self.channels.insert(entry.channel_name().to_string());
        let html = match entry.method {
            Method::Alert => self.render_alert(entry),
            Method::Group | Method::GroupCollapsed => self.render_group(entry),
            Method::GroupEnd => "</ul></li>".to_string(),
            Method::GroupSummary | Method::GroupUncollapse => return Ok(None),
            Method::Table | Method::Trace | Method::ProfileEnd => self
                .render_table(entry)
                .unwrap_or_else(|| self.render_default(entry)),
            _ => self.render_default(entry),
        };
        Ok(Some(html))
    }
}

fn has_format_directive(s: &str) -> bool {
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '%' {
            match chars.peek() {
                Some('%') => {
                    chars.next();
                }
                Some(d) if FORMAT_DIRECTIVES.contains(d) => return true,
                _ => {}
            }
        }
    }
    false
}

/// Nested object of channel name segments
fn channel_tree(channels: &BTreeSet<String>) -> serde_json::Value {
    let mut root = serde_json::Map::new();
    for channel in channels {
        let mut node = &mut root;
        for segment in channel.split('.') {
            let child = node
                .entry(segment.to_string())
                .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
            node = match child {
                serde_json::Value::Object(map) => map,
                _ => break,
            };
        }
    }
    serde_json::Value::Object(root)
}

fn channel_attr(entry: &LogEntry) -> String {
    format!(r#" data-channel="{}""#, escape_html(entry.channel_name()))
}

/// `class` plus the entry's channel and extra attributes
fn li_attrs(entry: &LogEntry, class: &str) -> String {
    let mut classes = class.to_string();
    let mut rest = String::new();
    for (name, value) in entry.meta.attribs() {
        if name == "class" {
            classes.push(' ');
            classes.push_str(&value);
        } else {
            rest.push_str(&format!(r#" {}="{}""#, escape_html(&name), escape_html(&value)));
        }
    }
    format!(
        r#" class="{}"{}{}"#,
        escape_html(&classes),
        channel_attr(entry),
        rest
    )
}

pub(crate) fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            other => out.push(other),
        }
    }
    out
}

fn escape_if(s: &str, sanitize: bool) -> String {
    if sanitize {
        escape_html(s)
    } else {
        s.to_string()
    }
}
