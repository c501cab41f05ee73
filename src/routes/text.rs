//! Plain text route
//!
//! Renders a line-oriented transcript: four spaces of indent per open group
//! and a symbol prefix per method. ANSI colour is available with the `ansi`
//! feature.

use super::{arg_glue, render_section};
use crate::core::{
    LogEntry, Method, OutputContext, Result, Route, RouteBase, RouteConfig, Subscription,
    TableData,
};

const INDENT: &str = "    ";

/// Stateful line formatter shared by the text, stream and email routes
#[derive(Debug, Clone, Default)]
pub struct TextFormatter {
    use_colors: bool,
    depth: usize,
}

impl TextFormatter {
    pub fn new(use_colors: bool) -> Self {
        Self {
            use_colors,
            depth: 0,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Forget group nesting (new section)
    pub fn reset(&mut self) {
        self.depth = 0;
    }

    /// Format one entry; `None` for entries that only close a group
    pub fn format(&mut self, entry: &LogEntry) -> Option<String> {
        match entry.method {
            Method::GroupEnd => {
                self.depth = self.depth.saturating_sub(1);
                return None;
            }
            Method::GroupSummary | Method::GroupUncollapse => return None,
            _ => {}
        }

        let indent = INDENT.repeat(self.depth);
        let prefix = prefix(entry);
        let text = if entry.method.is_tabular() {
            table_text(entry, &indent)
        } else {
            args_text(entry)
        };

        let line = match prefix {
            Some(prefix) => format!("{} {}", prefix, text),
            None => text,
        };
        let line = format!("{}{}", indent, self.paint(line, entry));

        if entry.method.opens_group() {
            self.depth += 1;
        }
        Some(line)
    }

    #[cfg(feature = "ansi")]
    fn paint(&self, line: String, entry: &LogEntry) -> String {
        use colored::Colorize;

        if !self.use_colors {
            return line;
        }
        match entry.method {
            Method::Error | Method::Assert => line.red().to_string(),
            Method::Warn => line.yellow().to_string(),
            Method::Info => line.blue().to_string(),
            Method::Group | Method::GroupCollapsed => line.bold().to_string(),
            Method::Alert => match entry.meta.level() {
                Some("success") => line.green().to_string(),
                Some("info") => line.blue().to_string(),
                Some("warn") => line.yellow().to_string(),
                _ => line.red().to_string(),
            },
            _ => line,
        }
    }

    #[cfg(not(feature = "ansi"))]
    fn paint(&self, line: String, _entry: &LogEntry) -> String {
        line
    }
}

fn prefix(entry: &LogEntry) -> Option<String> {
    let symbol = match entry.method {
        Method::Error => "⦻",
        Method::Info => "ℹ",
        Method::Warn => "⚠",
        Method::Assert => "≠",
        Method::Clear => "⌦",
        Method::Count | Method::CountReset => "✚",
        Method::Time | Method::TimeLog | Method::TimeEnd => "⏱",
        Method::Group | Method::GroupCollapsed => "▸",
        Method::Alert => {
            let level = entry.meta.level().unwrap_or("error").to_uppercase();
            return Some(format!("【{}】", level));
        }
        _ => return None,
    };
    Some(symbol.to_string())
}

fn args_text(entry: &LogEntry) -> String {
    let glue = arg_glue(&entry.args);
    let parts: Vec<String> = entry.args.iter().map(|arg| arg.to_text()).collect();
    parts.join(glue)
}

fn table_text(entry: &LogEntry, indent: &str) -> String {
    match TableData::from_entry(entry) {
        Some(table) => {
            let mut lines = Vec::new();
            if let Some(caption) = &table.caption {
                lines.push(format!("{}:", caption));
            }
            for row in table.to_text() {
                lines.push(format!("{}{}{}", indent, INDENT, row));
            }
            lines.join("\n")
        }
        None => args_text(entry),
    }
}

/// Text route configuration
#[derive(Debug, Clone, Default)]
pub struct TextConfig {
    pub route: RouteConfig,
    pub use_colors: bool,
}

impl TextConfig {
    #[must_use]
    pub fn with_route(mut self, route: RouteConfig) -> Self {
        self.route = route;
        self
    }

    #[must_use]
    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }
}

pub struct TextRoute {
    base: RouteBase,
    formatter: TextFormatter,
}

impl TextRoute {
    pub fn new(config: TextConfig) -> Self {
        Self {
            base: RouteBase::new("text", &config.route),
            formatter: TextFormatter::new(config.use_colors),
        }
    }
}

impl Default for TextRoute {
    fn default() -> Self {
        Self::new(TextConfig::default())
    }
}

impl Route for TextRoute {
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
        let mut lines = Vec::new();

        self.formatter.reset();
        lines.extend(render_section(self, snapshot.alerts().iter(), &scope));
        self.formatter.reset();
        lines.extend(render_section(self, snapshot.summary_entries(), &scope));
        self.formatter.reset();
        lines.extend(render_section(self, snapshot.log().iter(), &scope));

        if !lines.is_empty() {
            ctx.push_body(lines.join("\n") + "\n");
        }
        Ok(())
    }

    fn process_log_entry(&mut self, entry: &LogEntry) -> Result<Option<String>> {
        Ok(self.formatter.format(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Meta, Value};

    fn entry(method: Method, args: Vec<Value>) -> LogEntry {
        LogEntry::new("general", method, args)
    }

    #[test]
    fn test_prefixes_and_indent() {
        let mut formatter = TextFormatter::new(false);
        let lines: Vec<String> = vec![
            entry(Method::Group, vec![Value::from("outer")]),
            entry(Method::Warn, vec![Value::from("careful")]),
            entry(Method::GroupEnd, vec![]),
            entry(Method::Error, vec![Value::from("boom")]),
        ]
        .iter()
        .filter_map(|e| formatter.format(e))
        .collect();

        assert_eq!(lines, vec!["▸ outer", "    ⚠ careful", "⦻ boom"]);
    }

    #[test]
    fn test_alert_prefix() {
        let mut formatter = TextFormatter::new(false);
        let alert = entry(Method::Alert, vec![Value::from("Disk full")])
            .with_meta(Meta::new().with("level", "warn"));
        assert_eq!(formatter.format(&alert).as_deref(), Some("【WARN】 Disk full"));
    }

    #[test]
    fn test_two_arg_glue() {
        let mut formatter = TextFormatter::new(false);
        let e = entry(Method::Log, vec![Value::from("count"), Value::from(3)]);
        assert_eq!(formatter.format(&e).as_deref(), Some("count = 3"));

        let e = entry(Method::Log, vec![Value::from("count:"), Value::from(3)]);
        assert_eq!(formatter.format(&e).as_deref(), Some("count: 3"));

        let e = entry(Method::Log, vec![Value::from("a"), Value::from("b"), Value::from("c")]);
        assert_eq!(formatter.format(&e).as_deref(), Some("a, b, c"));
    }

    #[test]
    fn test_table_lines() {
        let mut formatter = TextFormatter::new(false);
        let data = Value::list(vec![Value::map(vec![("id", 1)])]);
        let e = entry(Method::Table, vec![data]).with_meta(Meta::new().with("caption", "users"));
        let text = formatter.format(&e).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "users:");
        assert!(lines[1].starts_with(INDENT));
        assert!(lines[1].contains("id"));
        assert_eq!(lines.len(), 3);
    }

    #[cfg(feature = "ansi")]
    #[test]
    fn test_colors() {
        colored::control::set_override(true);
        let mut formatter = TextFormatter::new(true);
        let e = entry(Method::Error, vec![Value::from("boom")]);
        let line = formatter.format(&e).unwrap();
        assert!(line.contains("\u{1b}["));
        colored::control::unset_override();
    }
}
