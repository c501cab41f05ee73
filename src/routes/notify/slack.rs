//! Slack incoming-webhook notifications

use super::{
    category_emoji, fatal_backtrace, headline, Notifier, NotifyConfig, WebhookSink,
    WebhookTransport,
};
use crate::core::{
    Environment, ErrorContext, ErrorEvent, EventKind, LogEntry, Result, Route, RouteBase,
    Subscription,
};
use serde_json::{json, Value as Json};

const ENV_VAR: &str = "SLACK_WEBHOOK_URL";

pub struct SlackRoute {
    base: RouteBase,
    sink: WebhookSink,
}

impl SlackRoute {
    pub fn new<T: WebhookTransport + 'static>(transport: T, config: NotifyConfig) -> Self {
        Self {
            base: RouteBase::new("slack", &config.route),
            sink: WebhookSink::new(Notifier::new("slack", &config, ENV_VAR), transport),
        }
    }
}

/// Block Kit message; `text` is the notification fallback
fn payload(error: &ErrorEvent, env: &dyn Environment) -> Json {
    let category = error.category();
    let mut blocks = vec![
        json!({
            "type": "header",
            "text": {
                "type": "plain_text",
                "text": format!("{} {}", category_emoji(category), category.label()),
                "emoji": true,
            },
        }),
        json!({
            "type": "section",
            "text": {
                "type": "mrkdwn",
                "text": format!("*{}:* {}", category.label(), error.message),
            },
        }),
        json!({
            "type": "context",
            "elements": [
                {"type": "mrkdwn", "text": error.location()},
                {"type": "mrkdwn", "text": env.request_line()},
            ],
        }),
    ];
    if let Some(frames) = fatal_backtrace(error) {
        blocks.push(json!({
            "type": "section",
            "text": {
                "type": "mrkdwn",
                "text": format!("*Backtrace*\n```{}```", frames.join("\n")),
            },
        }));
    }
    json!({
        "text": headline(error),
        "blocks": blocks,
    })
}

impl Route for SlackRoute {
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
