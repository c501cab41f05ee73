//! Email route
//!
//! At output, mails the plain-text transcript followed by the serialized log,
//! which [`unserialize_log`](super::unserialize_log) can restore.

use super::notify::Mailer;
use super::serialize::{serialize_log, SerializedLog};
use super::render_section;
use super::text::TextFormatter;
use crate::core::{
    ConsoleError, LogEntry, OutputContext, Result, Route, RouteBase, RouteConfig, Subscription,
};

const ENV_VAR: &str = "DEBUG_EMAIL_TO";

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub route: RouteConfig,
    /// Recipients; falls back to `DEBUG_EMAIL_TO`
    pub to: Option<String>,
    /// Defaults to `Debug Log: <request line>`
    pub subject: Option<String>,
    /// Deflate the serialized log
    pub compress: bool,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            route: RouteConfig::default(),
            to: None,
            subject: None,
            compress: true,
        }
    }
}

impl EmailConfig {
    #[must_use]
    pub fn with_route(mut self, route: RouteConfig) -> Self {
        self.route = route;
        self
    }

    #[must_use]
    pub fn with_to(mut self, to: impl Into<String>) -> Self {
        self.to = Some(to.into());
        self
    }

    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    #[must_use]
    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }
}

pub struct EmailRoute {
    base: RouteBase,
    config: EmailConfig,
    formatter: TextFormatter,
    mailer: Box<dyn Mailer>,
}

impl EmailRoute {
    pub fn new<M: Mailer + 'static>(mailer: M, config: EmailConfig) -> Self {
        Self {
            base: RouteBase::new("email", &config.route),
            config,
            formatter: TextFormatter::new(false),
            mailer: Box::new(mailer),
        }
    }

    fn included(&mut self, entries: &[LogEntry]) -> Vec<LogEntry> {
        entries
            .iter()
            .filter(|entry| self.base.should_include(entry))
            .cloned()
            .collect()
    }
}

impl Route for EmailRoute {
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
        if snapshot.is_empty() {
            return Ok(());
        }
        let to = self
            .config
            .to
            .clone()
            .or_else(|| ctx.env.env_var(ENV_VAR))
            .filter(|to| !to.trim().is_empty())
            .ok_or_else(|| {
                ConsoleError::config(
                    "email",
                    format!("no recipient configured and {} is not set", ENV_VAR),
                )
            })?;

        let scope = ctx.scope;
        let mut lines = Vec::new();
        self.formatter.reset();
        lines.extend(render_section(self, snapshot.alerts().iter(), &scope));
        self.formatter.reset();
        lines.extend(render_section(self, snapshot.summary_entries(), &scope));
        self.formatter.reset();
        lines.extend(render_section(self, snapshot.log().iter(), &scope));

        let mut log = SerializedLog::from_snapshot(snapshot, ctx.env.request_id());
        log.alerts = self.included(&log.alerts);
        log.log = self.included(&log.log);
        let summary = std::mem::take(&mut log.log_summary);
        for (priority, entries) in summary {
            let entries = self.included(&entries);
            if !entries.is_empty() {
                log.log_summary.insert(priority, entries);
            }
        }

        let mut body = lines.join("\n");
        body.push_str("\n\n");
        body.push_str(&serialize_log(&log, self.config.compress)?);

        let subject = self
            .config
            .subject
            .clone()
            .unwrap_or_else(|| format!("Debug Log: {}", ctx.env.request_line()));
        match self.mailer.send(&to, &subject, &body) {
            Ok(()) => tracing::debug!(route = self.name(), to = %to, "debug log mailed"),
            Err(e) => tracing::warn!(route = self.name(), error = %e, "debug log not mailed"),
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
    use crate::core::{Console, StaticEnvironment, Value};
    use crate::routes::{unserialize_log, MemoryMailer};

    #[test]
    fn test_mails_transcript_and_log() {
        let mailer = MemoryMailer::new();
        let mut console = Console::builder()
            .environment(StaticEnvironment::http("GET", "/checkout").with_request_id("r9"))
            .route(EmailRoute::new(
                mailer.clone(),
                EmailConfig::default().with_to("dev@example.com"),
            ))
            .build();
        console.warn(vec![Value::from("low stock")]);
        console.output();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "dev@example.com");
        assert_eq!(sent[0].subject, "Debug Log: GET /checkout");
        assert!(sent[0].body.starts_with("⚠ low stock\n\nSTART DEBUG\n"));

        let log = unserialize_log(&sent[0].body).unwrap();
        assert_eq!(log.request_id, "r9");
        assert_eq!(log.log[0].first_arg_text(), "low stock");
    }

    #[test]
    fn test_excluded_channels_not_serialized() {
        let mailer = MemoryMailer::new();
        let config = EmailConfig::default()
            .with_to("dev@example.com")
            .with_route(RouteConfig::default().with_channels_exclude(["general.sql"]));
        let mut console = Console::builder()
            .route(EmailRoute::new(mailer.clone(), config))
            .build();
        console.log(vec![Value::from("kept")]);
        console.channel("sql").log(vec![Value::from("select 1")]);
        console.output();

        let log = unserialize_log(&mailer.sent()[0].body).unwrap();
        assert_eq!(log.log.len(), 1);
        assert_eq!(log.log[0].first_arg_text(), "kept");
    }

    #[test]
    fn test_missing_recipient_fails_route() {
        let mailer = MemoryMailer::new();
        let mut console = Console::builder()
            .environment(StaticEnvironment::default().isolated())
            .route(EmailRoute::new(mailer.clone(), EmailConfig::default()))
            .build();
        console.log(vec![Value::from("x")]);
        console.output();

        assert!(mailer.sent().is_empty());
        assert_eq!(console.metrics().routes_failed(), 1);
    }
}
