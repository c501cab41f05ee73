//! Route implementations

pub mod chrome_logger;
pub mod email;
pub mod firephp;
pub mod html;
pub mod notify;
pub mod script;
pub mod serialize;
pub mod server_log;
pub mod stream;
pub mod text;
pub mod wamp;
pub mod wamp_crate;

pub use chrome_logger::{
    ChromeLoggerConfig, ChromeLoggerRoute, CHROME_LOGGER_HEADER, CHROME_LOGGER_MAX_BYTES,
};
pub use email::{EmailConfig, EmailRoute};
pub use firephp::{
    chunk_message, FirePhpConfig, FirePhpRoute, FIREPHP_CHUNK_SIZE, FIREPHP_MESSAGE_LIMIT,
};
pub use html::{HtmlConfig, HtmlRoute};
pub use notify::{
    DiscordRoute, EmailErrorRoute, Mailer, MemoryMailer, MemoryTransport, NotifyConfig,
    SentEmail, SlackRoute, TeamsRoute, WebhookTransport,
};
#[cfg(feature = "webhook")]
pub use notify::ReqwestTransport;
pub use script::{ScriptConfig, ScriptRoute};
pub use serialize::{serialize_log, unserialize_log, SerializedLog, SERIALIZE_VERSION};
pub use server_log::{ServerLogConfig, ServerLogRoute, SERVER_LOG_HEADER};
pub use stream::{StreamConfig, StreamRoute, StreamTarget};
pub use text::{TextConfig, TextFormatter, TextRoute};
pub use wamp::{
    ChannelPublisher, MemoryPublisher, WampConfig, WampMessage, WampPublisher, WampRoute,
    DEFAULT_TOPIC,
};
pub use wamp_crate::{CratedEntry, WampCrate};

use crate::core::{
    LogEntry, RenderScope, Result, Route, Value, INF_TOKEN, NAN_TOKEN, NEG_INF_TOKEN,
    UNDEFINED_TOKEN,
};

/// Literal replacements for the sentinel strings of [`Value::to_json`]
#[derive(Debug, Clone, Copy)]
pub(crate) struct SentinelTokens {
    pub undefined: &'static str,
    pub inf: &'static str,
    pub neg_inf: &'static str,
    pub nan: &'static str,
}

/// Plain JSON: undefined becomes `null`, non-finite floats become strings
pub(crate) const JSON_TOKENS: SentinelTokens = SentinelTokens {
    undefined: "null",
    inf: "\"INF\"",
    neg_inf: "\"-INF\"",
    nan: "\"NaN\"",
};

/// JavaScript literals
pub(crate) const SCRIPT_TOKENS: SentinelTokens = SentinelTokens {
    undefined: "undefined",
    inf: "Infinity",
    neg_inf: "-Infinity",
    nan: "NaN",
};

/// Encode `json` and swap each quoted sentinel for its replacement
pub(crate) fn encode_json(json: &serde_json::Value, tokens: &SentinelTokens) -> Result<String> {
    let mut encoded = serde_json::to_string(json)?;
    for (sentinel, replacement) in [
        (UNDEFINED_TOKEN, tokens.undefined),
        (INF_TOKEN, tokens.inf),
        (NEG_INF_TOKEN, tokens.neg_inf),
        (NAN_TOKEN, tokens.nan),
    ] {
        let quoted = serde_json::to_string(sentinel)?;
        if encoded.contains(&quoted) {
            encoded = encoded.replace(&quoted, replacement);
        }
    }
    Ok(encoded)
}

/// Separator between rendered arguments
///
/// Two arguments whose first is a string read as `label = value`, or
/// `label: value` when the label already ends with `:` or `=`.
pub(crate) fn arg_glue(args: &[Value]) -> &'static str {
    match args {
        [Value::String(first), _] if first.ends_with(':') || first.ends_with('=') => " ",
        [Value::String(_), _] => " = ",
        _ => ", ",
    }
}

/// Render `entries` in order through [`Route::render_entry`]
pub(crate) fn render_section<'e, R, I>(
    route: &mut R,
    entries: I,
    scope: &RenderScope<'_>,
) -> Vec<String>
where
    R: Route + ?Sized,
    I: IntoIterator<Item = &'e LogEntry>,
{
    entries
        .into_iter()
        .filter_map(|entry| route.render_entry(entry, scope))
        .collect()
}

/// Level an alert maps to on console-style targets (`error`, `info`, `warn`)
pub(crate) fn alert_console_method(entry: &LogEntry) -> &'static str {
    match entry.meta.level() {
        Some("info") | Some("success") => "info",
        Some("warn") => "warn",
        _ => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arg_glue() {
        assert_eq!(arg_glue(&[Value::from("a"), Value::from(1)]), " = ");
        assert_eq!(arg_glue(&[Value::from("a="), Value::from(1)]), " ");
        assert_eq!(arg_glue(&[Value::from(1), Value::from(1)]), ", ");
        assert_eq!(arg_glue(&[Value::from("a")]), ", ");
    }

    #[test]
    fn test_encode_json_tokens() {
        let json = Value::list(vec![
            Value::Undefined,
            Value::Float(f64::INFINITY),
            Value::Float(f64::NEG_INFINITY),
            Value::Float(f64::NAN),
        ])
        .to_json();

        assert_eq!(
            encode_json(&json, &JSON_TOKENS).unwrap(),
            r#"[null,"INF","-INF","NaN"]"#
        );
        assert_eq!(
            encode_json(&json, &SCRIPT_TOKENS).unwrap(),
            "[undefined,Infinity,-Infinity,NaN]"
        );
    }
}
