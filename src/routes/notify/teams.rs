//! Microsoft Teams notifications as an Adaptive Card

use super::{fatal_backtrace, headline, Notifier, NotifyConfig, WebhookSink, WebhookTransport};
use crate::core::{
    Environment, ErrorContext, ErrorEvent, EventKind, LogEntry, Result, Route, RouteBase,
    Subscription,
};
use serde_json::{json, Value as Json};

const ENV_VAR: &str = "TEAMS_WEBHOOK_URL";
const CARD_CONTENT_TYPE: &str = "application/vnd.microsoft.card.adaptive";
const CARD_SCHEMA: &str = "http://adaptivecards.io/schemas/adaptive-card.json";

pub struct TeamsRoute {
    base: RouteBase,
    sink: WebhookSink,
}

impl TeamsRoute {
    pub fn new<T: WebhookTransport + 'static>(transport: T, config: NotifyConfig) -> Self {
        Self {
            base: RouteBase::new("teams", &config.route),
            sink: WebhookSink::new(Notifier::new("teams", &config, ENV_VAR), transport),
        }
    }
}

fn payload(error: &ErrorEvent, env: &dyn Environment) -> Json {
    let color = if error.category().is_error() {
        "Attention"
    } else {
        "Warning"
    };
    let mut body = vec![
        json!({
            "type": "TextBlock",
            "text": headline(error),
            "weight": "Bolder",
            "size": "Medium",
            "color": color,
            "wrap": true,
        }),
        json!({
            "type": "FactSet",
            "facts": [
                {"title": "Location", "value": error.location()},
                {"title": "Request", "value": env.request_line()},
                {"title": "Request id", "value": env.request_id()},
            ],
        }),
    ];
    if let Some(frames) = fatal_backtrace(error) {
        body.push(json!({
            "type": "TextBlock",
            "text": "Backtrace",
            "weight": "Bolder",
            "separator": true,
        }));
        // TextBlock markdown needs a blank line to break
        body.push(json!({
            "type": "TextBlock",
            "text": frames.join("\n\n"),
            "fontType": "Monospace",
            "size": "Small",
            "wrap": true,
        }));
    }
    let card = json!({
        "$schema": CARD_SCHEMA,
        "type": "AdaptiveCard",
        "version": "1.2",
        "body": body,
    });
    json!({
        "type": "message",
        "attachments": [{"contentType": CARD_CONTENT_TYPE, "content": card}],
    })
}

impl Route for TeamsRoute {
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
