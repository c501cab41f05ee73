//! Portable log serialization
//!
//! A serialized log is a text block safe to paste into an email:
//!
//! ```text
//! START DEBUG
//! <base64, 76 columns per line, CRLF terminated>
//! END DEBUG
//! ```
//!
//! The decoded payload is one format byte (`0` plain JSON, `1` raw deflate
//! JSON) followed by a versioned envelope.

use crate::core::{ConsoleError, LogEntry, LogSnapshot, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Read, Write};

pub const SERIALIZE_VERSION: u32 = 1;

const START_MARKER: &str = "START DEBUG";
const END_MARKER: &str = "END DEBUG";
const LINE_WIDTH: usize = 76;
const FORMAT_JSON: u8 = b'0';
const FORMAT_DEFLATE: u8 = b'1';

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SerializedLog {
    pub version: u32,
    pub request_id: String,
    pub alerts: Vec<LogEntry>,
    /// Summary entries keyed by priority
    pub log_summary: BTreeMap<i32, Vec<LogEntry>>,
    pub log: Vec<LogEntry>,
}

impl SerializedLog {
    pub fn from_snapshot(snapshot: &LogSnapshot, request_id: impl Into<String>) -> Self {
        Self {
            version: SERIALIZE_VERSION,
            request_id: request_id.into(),
            alerts: snapshot.alerts().to_vec(),
            log_summary: snapshot.summary().iter().cloned().collect(),
            log: snapshot.log().to_vec(),
        }
    }

    /// Alerts, then summary highest priority first, then log
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.alerts
            .iter()
            .chain(self.log_summary.values().rev().flatten())
            .chain(self.log.iter())
    }
}

pub fn serialize_log(log: &SerializedLog, compress: bool) -> Result<String> {
    let json = serde_json::to_vec(log)?;
    let mut payload = Vec::with_capacity(json.len() + 1);
    if compress {
        payload.push(FORMAT_DEFLATE);
        let mut encoder = DeflateEncoder::new(payload, Compression::default());
        encoder.write_all(&json)?;
        payload = encoder.finish()?;
    } else {
        payload.push(FORMAT_JSON);
        payload.extend_from_slice(&json);
    }

    let encoded = STANDARD.encode(&payload);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / LINE_WIDTH * 2 + 24);
    out.push_str(START_MARKER);
    out.push('\n');
    // base64 output is ASCII, so byte chunks are valid str slices
    for line in encoded.as_bytes().chunks(LINE_WIDTH) {
        out.push_str(std::str::from_utf8(line).map_err(|e| ConsoleError::other(e.to_string()))?);
        out.push_str("\r\n");
    }
    out.push_str(END_MARKER);
    Ok(out)
}

/// Decode a block produced by [`serialize_log`]
///
/// Text around the markers is ignored, so a whole email body can be passed.
pub fn unserialize_log(text: &str) -> Result<SerializedLog> {
    let start = text
        .find(START_MARKER)
        .ok_or_else(|| ConsoleError::decode("missing START DEBUG marker"))?
        + START_MARKER.len();
    let end = text[start..]
        .find(END_MARKER)
        .map(|pos| start + pos)
        .ok_or_else(|| ConsoleError::decode("missing END DEBUG marker"))?;

    let compact: String = text[start..end].chars().filter(|c| !c.is_whitespace()).collect();
    let payload = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| ConsoleError::decode(format!("invalid base64: {}", e)))?;

    let (format, body) = payload
        .split_first()
        .ok_or_else(|| ConsoleError::decode("empty payload"))?;
    let json = match *format {
        FORMAT_JSON => body.to_vec(),
        FORMAT_DEFLATE => {
            let mut inflated = Vec::new();
            DeflateDecoder::new(body)
                .read_to_end(&mut inflated)
                .map_err(|e| ConsoleError::decode(format!("invalid deflate stream: {}", e)))?;
            inflated
        }
        other => {
            return Err(ConsoleError::decode(format!("unknown format byte {:#04x}", other)));
        }
    };

    let log: SerializedLog = serde_json::from_slice(&json)
        .map_err(|e| ConsoleError::decode(format!("invalid envelope: {}", e)))?;
    if log.version != SERIALIZE_VERSION {
        return Err(ConsoleError::decode(format!("unsupported version {}", log.version)));
    }
    Ok(log)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Console, Method, ObjectValue, Value};

    fn sample() -> SerializedLog {
        let mut console = Console::new();
        console.alert("heads up", crate::core::AlertLevel::Info);
        console.group_summary(2);
        console.info(vec![Value::from("built in"), Value::from(0.25)]);
        console.group_end();
        console.log(vec![
            Value::from("cart"),
            Value::from(ObjectValue::new("Cart").with_property("items", Value::list(vec![1, 2]))),
        ]);
        console.warn(vec![Value::Undefined, Value::Float(f64::NAN)]);
        SerializedLog::from_snapshot(&console.store().snapshot(), "req1")
    }

    #[test]
    fn test_block_layout() {
        let text = serialize_log(&sample(), false).unwrap();
        assert!(text.starts_with("START DEBUG\n"));
        assert!(text.ends_with("\r\nEND DEBUG"));

        let body = &text["START DEBUG\n".len()..text.len() - "END DEBUG".len()];
        let lines: Vec<&str> = body.split("\r\n").filter(|l| !l.is_empty()).collect();
        assert!(lines.len() > 1);
        assert!(lines[..lines.len() - 1].iter().all(|l| l.len() == LINE_WIDTH));
        assert!(lines.last().unwrap().len() <= LINE_WIDTH);
    }

    #[test]
    fn test_both_formats_decode() {
        let log = sample();
        for compress in [false, true] {
            let decoded = unserialize_log(&serialize_log(&log, compress).unwrap()).unwrap();
            assert_eq!(decoded.request_id, "req1");
            assert_eq!(decoded.alerts.len(), 1);
            assert_eq!(decoded.log_summary[&2][0].method, Method::Info);
            assert_eq!(decoded.log[1].args[0], Value::Undefined);
            assert!(matches!(decoded.log[1].args[1], Value::Float(f) if f.is_nan()));
        }
    }

    #[test]
    fn test_entries_order() {
        let log = sample();
        let methods: Vec<Method> = log.entries().map(|e| e.method.clone()).collect();
        assert_eq!(methods, vec![Method::Alert, Method::Info, Method::Log, Method::Warn]);
    }

    #[test]
    fn test_surrounding_text_ignored() {
        let text = serialize_log(&sample(), true).unwrap();
        let email = format!("Hello,\n\n{}\n\nregards", text);
        assert_eq!(unserialize_log(&email).unwrap().log.len(), 2);
    }

    #[test]
    fn test_decode_failures() {
        assert!(unserialize_log("no markers").is_err());
        assert!(unserialize_log("START DEBUG\n!!!\r\nEND DEBUG").is_err());

        let unknown_format = format!("START DEBUG\n{}\r\nEND DEBUG", STANDARD.encode(b"9{}"));
        let err = unserialize_log(&unknown_format).unwrap_err();
        assert!(err.to_string().contains("format byte"));

        let foreign = format!(
            "START DEBUG\n{}\r\nEND DEBUG",
            STANDARD.encode(br#"0{"version":1,"requestId":"r","alerts":[],"logSummary":{},"log":[{"channel":"general","method":"log","args":[{"type":"closure","value":1}]}]}"#)
        );
        assert!(unserialize_log(&foreign).is_err());

        let future = format!(
            "START DEBUG\n{}\r\nEND DEBUG",
            STANDARD.encode(br#"0{"version":2,"requestId":"r","alerts":[],"logSummary":{},"log":[]}"#)
        );
        let err = unserialize_log(&future).unwrap_err();
        assert!(err.to_string().contains("unsupported version"));
    }
}
