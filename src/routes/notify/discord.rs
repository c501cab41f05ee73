//! Discord webhook notifications

use super::{fatal_backtrace, headline, Notifier, NotifyConfig, WebhookSink, WebhookTransport};
use crate::core::{
    Environment, ErrorContext, ErrorEvent, EventKind, LogEntry, Result, Route, RouteBase,
    Subscription,
};
use serde_json::{json, Value as Json};

const ENV_VAR: &str = "DISCORD_WEBHOOK_URL";
/// Discord rejects longer `content`
const CONTENT_LIMIT: usize = 2000;
/// Embed field values are capped at 1024 characters
const FIELD_LIMIT: usize = 1024;
const CODE_FENCE: &str = "```";
const COLOR_ERROR: u32 = 0xd9_53_4f;
const COLOR_WARNING: u32 = 0xf0_ad_4e;

pub struct DiscordRoute {
    base: RouteBase,
    sink: WebhookSink,
}

impl DiscordRoute {
    pub fn new<T: WebhookTransport + 'static>(transport: T, config: NotifyConfig) -> Self {
        Self {
            base: RouteBase::new("discord", &config.route),
            sink: WebhookSink::new(Notifier::new("discord", &config, ENV_VAR), transport),
        }
    }
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut out: String = text.chars().take(limit - 1).collect();
    out.push('…');
    out
}

fn payload(error: &ErrorEvent, env: &dyn Environment) -> Json {
    let color = if error.category().is_error() {
        COLOR_ERROR
    } else {
        COLOR_WARNING
    };
    let mut fields = vec![
        json!({"name": "Request id", "value": env.request_id(), "inline": true}),
        json!({"name": "Type", "value": error.category().as_str(), "inline": true}),
    ];
    if let Some(frames) = fatal_backtrace(error) {
        // fences and their newlines count toward the field limit
        let frames = truncate(&frames.join("\n"), FIELD_LIMIT - 2 * (CODE_FENCE.len() + 1));
        fields.push(json!({
            "name": "Backtrace",
            "value": format!("{fence}\n{}\n{fence}", frames, fence = CODE_FENCE),
            "inline": false,
        }));
    }
    json!({
        "content": truncate(&headline(error), CONTENT_LIMIT),
        "embeds": [{
            "title": env.request_line(),
            "description": error.location(),
            "color": color,
            "fields": fields,
        }],
    })
}

impl Route for DiscordRoute {
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
        self.sink.notify(error, ctx, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Console, ErrorLevel, StaticEnvironment, TraceFrame};
    use crate::routes::MemoryTransport;

    fn discord_console(transport: &MemoryTransport) -> Console {
        let mut console = Console::builder()
            .environment(
                StaticEnvironment::cli("bin/import")
                    .with_request_id("abc")
                    .with_env_var("DISCORD_WEBHOOK_URL", "https://discord.test/hook"),
            )
            .route(DiscordRoute::new(transport.clone(), NotifyConfig::default()))
            .build();
        console.set_collect(false);
        console
    }

    #[test]
    fn test_content_and_embed() {
        let transport = MemoryTransport::new();
        let mut console = discord_console(&transport);
        let mut error = ErrorEvent::new(ErrorLevel::USER_ERROR, "Payment failed", "/app/pay.rs", 9);
        console.handle_error(&mut error).unwrap();

        let requests = transport.requests();
        let (url, body) = &requests[0];
        assert_eq!(url, "https://discord.test/hook");
        assert_eq!(body["content"], "Error: Payment failed");
        assert_eq!(body["embeds"][0]["title"], "$ bin/import");
        assert_eq!(body["embeds"][0]["color"], COLOR_ERROR);
        assert_eq!(body["embeds"][0]["fields"][0]["value"], "abc");
        assert_eq!(body["embeds"][0]["fields"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_fatal_error_has_backtrace_field() {
        let transport = MemoryTransport::new();
        let mut console = discord_console(&transport);
        let frames = (0..200)
            .map(|i| TraceFrame::new(format!("/app/deep/module_{}.rs", i), i).with_function("step"))
            .collect();
        let mut error =
            ErrorEvent::new(ErrorLevel::ERROR, "Stack exhausted", "/app/deep.rs", 1).with_backtrace(frames);
        console.handle_error(&mut error).unwrap();

        let requests = transport.requests();
        let field = &requests[0].1["embeds"][0]["fields"][2];
        assert_eq!(field["name"], "Backtrace");
        let value = field["value"].as_str().unwrap();
        assert!(value.starts_with("```\n/app/deep/module_0.rs:0 step\n"));
        assert!(value.ends_with("…\n```"));
        assert!(value.chars().count() <= FIELD_LIMIT);
        assert_eq!(requests[0].1["embeds"][0]["color"], COLOR_ERROR);
    }

    #[test]
    fn test_throttled_repeat_not_posted() {
        let transport = MemoryTransport::new();
        let mut console = discord_console(&transport);

        let mut error = ErrorEvent::new(ErrorLevel::WARNING, "w", "/app/a.rs", 1);
        console.handle_error(&mut error).unwrap();
        let stats = error.throttle.clone();

        // same error in a later request, stats restored by the host
        let mut again =
            ErrorEvent::new(ErrorLevel::WARNING, "w", "/app/a.rs", 1).with_throttle_stats(stats);
        let mut next = discord_console(&transport);
        next.handle_error(&mut again).unwrap();

        assert_eq!(transport.requests().len(), 1);
        assert_eq!(again.throttle_stat("discord").unwrap().count_since, 1);
        assert_eq!(next.metrics().notifications_suppressed(), 1);
    }

    #[test]
    fn test_long_content_truncated() {
        let text = "x".repeat(CONTENT_LIMIT + 10);
        let truncated = truncate(&text, CONTENT_LIMIT);
        assert_eq!(truncated.chars().count(), CONTENT_LIMIT);
        assert!(truncated.ends_with('…'));
    }

    #[test]
    fn test_transport_failure_swallowed() {
        let mut console = Console::builder()
            .environment(StaticEnvironment::default().isolated())
            .route(DiscordRoute::new(
                MemoryTransport::failing(),
                NotifyConfig::default().with_destination("https://discord.test/hook"),
            ))
            .build();
        console.set_collect(false);

        let mut error = ErrorEvent::new(ErrorLevel::WARNING, "w", "/app/a.rs", 1);
        assert!(console.handle_error(&mut error).is_ok());
        assert_eq!(console.metrics().notifications_sent(), 0);
    }
}
