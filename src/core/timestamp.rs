//! Timestamp formatting utilities
//!
//! Formats used for stream banners, ServerLog file names and the HTML
//! timestamp tooltips.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Seconds either side of "now" a number must fall in to be shown as a date
pub const TIMESTAMP_WINDOW_SECS: i64 = 365 * 24 * 60 * 60;

/// Standardized timestamp format options
///
/// # Examples
///
/// ```
/// use debug_console::core::TimestampFormat;
/// use chrono::{TimeZone, Utc};
///
/// let at = Utc.with_ymd_and_hms(2025, 1, 8, 10, 30, 45).unwrap();
/// assert_eq!(TimestampFormat::Compact.format(&at), "20250108103045");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestampFormat {
    /// RFC 3339 format: `2025-01-08T10:30:45+00:00`
    #[default]
    Rfc3339,

    /// ISO 8601 with milliseconds: `2025-01-08T10:30:45.123Z`
    Iso8601,

    /// Unix timestamp in seconds: `1736332245`
    Unix,

    /// Sortable digits only: `20250108103045`
    ///
    /// Used for file names.
    Compact,

    /// Human readable: `2025-01-08 10:30:45 UTC`
    Readable,

    /// Custom strftime format
    Custom(String),
}

impl TimestampFormat {
    #[must_use]
    pub fn format(&self, datetime: &DateTime<Utc>) -> String {
        match self {
            TimestampFormat::Rfc3339 => datetime.to_rfc3339(),
            TimestampFormat::Iso8601 => datetime.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            TimestampFormat::Unix => datetime.timestamp().to_string(),
            TimestampFormat::Compact => datetime.format("%Y%m%d%H%M%S").to_string(),
            TimestampFormat::Readable => datetime.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            TimestampFormat::Custom(format_str) => datetime.format(format_str).to_string(),
        }
    }

    #[must_use]
    pub fn now(&self) -> String {
        self.format(&Utc::now())
    }
}

/// Readable date for numbers that look like a Unix timestamp
///
/// A number qualifies when it lies within [`TIMESTAMP_WINDOW_SECS`] of `now`.
pub fn timestamp_title(seconds: f64, now: &DateTime<Utc>) -> Option<String> {
    if !seconds.is_finite() {
        return None;
    }
    let now_secs = now.timestamp() as f64;
    let window = TIMESTAMP_WINDOW_SECS as f64;
    if seconds < now_secs - window || seconds > now_secs + window {
        return None;
    }
    Utc.timestamp_opt(seconds.trunc() as i64, 0)
        .single()
        .map(|at| TimestampFormat::Readable.format(&at))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_datetime() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 8, 10, 30, 45)
            .single()
            .expect("valid datetime")
            + chrono::Duration::milliseconds(123)
    }

    #[test]
    fn test_formats() {
        let at = fixed_datetime();
        assert_eq!(TimestampFormat::Iso8601.format(&at), "2025-01-08T10:30:45.123Z");
        assert_eq!(TimestampFormat::Compact.format(&at), "20250108103045");
        assert_eq!(TimestampFormat::Readable.format(&at), "2025-01-08 10:30:45 UTC");
        assert!(TimestampFormat::Rfc3339.format(&at).starts_with("2025-01-08T10:30:45"));
        assert_eq!(
            TimestampFormat::Custom("%Y/%m/%d".to_string()).format(&at),
            "2025/01/08"
        );
    }

    #[test]
    fn test_timestamp_title() {
        let now = fixed_datetime();
        let secs = now.timestamp() as f64;

        assert_eq!(
            timestamp_title(secs, &now).as_deref(),
            Some("2025-01-08 10:30:45 UTC")
        );
        assert!(timestamp_title(secs - 30.0 * 86400.0, &now).is_some());
        assert!(timestamp_title(42.0, &now).is_none());
        assert!(timestamp_title(secs + 2.0 * TIMESTAMP_WINDOW_SECS as f64, &now).is_none());
        assert!(timestamp_title(f64::NAN, &now).is_none());
    }

    #[test]
    fn test_serialization() {
        let json = serde_json::to_string(&TimestampFormat::Compact).expect("serialize");
        assert_eq!(json, "\"Compact\"");

        let format: TimestampFormat =
            serde_json::from_str(r#"{"Custom":"%Y-%m-%d"}"#).expect("deserialize Custom");
        assert_eq!(format, TimestampFormat::Custom("%Y-%m-%d".to_string()));
    }
}
