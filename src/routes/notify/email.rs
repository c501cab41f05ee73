//! Error notifications by email

use super::{frame_line, headline, Mailer, Notifier, NotifyConfig};
use crate::core::{
    Environment, ErrorContext, ErrorEvent, EventKind, LogEntry, Result, Route, RouteBase,
    Subscription,
};
use std::fmt::Write as _;

const ENV_VAR: &str = "DEBUG_EMAIL_TO";
const SUBJECT_LIMIT: usize = 120;

pub struct EmailErrorRoute {
    base: RouteBase,
    notifier: Notifier,
    mailer: Box<dyn Mailer>,
}

impl EmailErrorRoute {
    pub fn new<M: Mailer + 'static>(mailer: M, config: NotifyConfig) -> Self {
        Self {
            base: RouteBase::new("email", &config.route),
            notifier: Notifier::new("email", &config, ENV_VAR),
            mailer: Box::new(mailer),
        }
    }
}

fn subject(error: &ErrorEvent) -> String {
    let line = headline(error);
    let line = line.lines().next().unwrap_or_default();
    if line.chars().count() <= SUBJECT_LIMIT {
        return line.to_string();
    }
    line.chars().take(SUBJECT_LIMIT).collect()
}

fn body(error: &ErrorEvent, env: &dyn Environment) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", headline(error));
    let _ = writeln!(out);
    let _ = writeln!(out, "File: {}", error.location());
    let _ = writeln!(out, "Request: {}", env.request_line());
    let _ = writeln!(out, "Request id: {}", env.request_id());
    if !error.backtrace.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Backtrace:");
        for frame in &error.backtrace {
            let _ = writeln!(out, "  {}", frame_line(frame));
        }
    }
    out
}

impl Route for EmailErrorRoute {
    fn base(&self) -> &RouteBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut RouteBase {
        &mut self.base
    }

    fn subscriptions(&self) -> Vec<Subscription> {
        vec![Subscription::new(EventKind::Error, 0)]
    }

    fn process_log_entry(&mut self, _entry: &LogEntry) -> Result<Option<String>> {
        Ok(None)
    }

    fn on_error(&mut self, error: &mut ErrorEvent, ctx: &ErrorContext<'_>) -> Result<()> {
        if !self.notifier.admit(error, ctx) {
            return Ok(());
        }
        let to = self.notifier.destination(ctx.env)?;
        let sent = self.mailer.send(&to, &subject(error), &body(error, ctx.env));
        self.notifier.delivered(sent, error, ctx);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Console, ErrorLevel, StaticEnvironment, TraceFrame};
    use crate::routes::MemoryMailer;

    #[test]
    fn test_sends_mail_with_backtrace() {
        let mailer = MemoryMailer::new();
        let mut console = Console::builder()
            .environment(
                StaticEnvironment::http("GET", "/report")
                    .with_request_id("req7")
                    .with_env_var("DEBUG_EMAIL_TO", "ops@example.com"),
            )
            .route(EmailErrorRoute::new(mailer.clone(), NotifyConfig::default()))
            .build();
        console.set_collect(false);

        let mut error = ErrorEvent::new(ErrorLevel::USER_ERROR, "Report failed", "/app/report.rs", 30)
            .with_backtrace(vec![
                TraceFrame::new("/app/report.rs", 30).with_function("build"),
                TraceFrame::new("/app/main.rs", 5),
            ]);
        console.handle_error(&mut error).unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "ops@example.com");
        assert_eq!(sent[0].subject, "Error: Report failed");
        assert!(sent[0].body.contains("File: /app/report.rs (line 30)"));
        assert!(sent[0].body.contains("Request: GET /report"));
        assert!(sent[0].body.contains("  /app/report.rs:30 build\n  /app/main.rs:5\n"));
    }

    #[test]
    fn test_in_console_errors_not_mailed() {
        let mailer = MemoryMailer::new();
        let mut console = Console::builder()
            .route(EmailErrorRoute::new(
                mailer.clone(),
                NotifyConfig::default().with_destination("ops@example.com"),
            ))
            .build();

        let mut error = ErrorEvent::new(ErrorLevel::WARNING, "w", "/app/a.rs", 1);
        console.handle_error(&mut error).unwrap();
        assert!(error.in_console);
        assert!(mailer.sent().is_empty());
    }

    #[test]
    fn test_failed_send_keeps_error_unthrottled() {
        let mut console = Console::builder()
            .environment(StaticEnvironment::default().isolated())
            .route(EmailErrorRoute::new(
                MemoryMailer::failing(),
                NotifyConfig::default().with_destination("ops@example.com"),
            ))
            .build();
        console.set_collect(false);

        let mut error = ErrorEvent::new(ErrorLevel::WARNING, "w", "/app/a.rs", 1);
        console.handle_error(&mut error).unwrap();
        assert_eq!(console.metrics().notifications_sent(), 0);
        assert!(error.throttle_stat("email").is_none());
    }

    #[test]
    fn test_missing_recipient_keeps_error_unthrottled() {
        let mailer = MemoryMailer::new();
        let mut console = Console::builder()
            .environment(StaticEnvironment::default().isolated())
            .route(EmailErrorRoute::new(mailer.clone(), NotifyConfig::default()))
            .build();
        console.set_collect(false);

        let mut error = ErrorEvent::new(ErrorLevel::WARNING, "w", "/app/a.rs", 1);
        assert!(console.handle_error(&mut error).unwrap_err().is_config());
        assert!(mailer.sent().is_empty());
        assert!(error.throttle_stat("email").is_none());
    }

    #[test]
    fn test_subject_is_single_line() {
        let error = ErrorEvent::new(ErrorLevel::WARNING, "first\nsecond", "f", 1);
        assert_eq!(subject(&error), "Warning: first");
    }
}
