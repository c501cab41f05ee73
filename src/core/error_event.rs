//! Error events delivered to error-notification routes

use super::environment::TraceFrame;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::BitOr;

/// Error type bitmask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorLevel(u32);

impl ErrorLevel {
    pub const ERROR: ErrorLevel = ErrorLevel(1);
    pub const WARNING: ErrorLevel = ErrorLevel(2);
    pub const PARSE: ErrorLevel = ErrorLevel(4);
    pub const NOTICE: ErrorLevel = ErrorLevel(8);
    pub const CORE_ERROR: ErrorLevel = ErrorLevel(16);
    pub const CORE_WARNING: ErrorLevel = ErrorLevel(32);
    pub const COMPILE_ERROR: ErrorLevel = ErrorLevel(64);
    pub const COMPILE_WARNING: ErrorLevel = ErrorLevel(128);
    pub const USER_ERROR: ErrorLevel = ErrorLevel(256);
    pub const USER_WARNING: ErrorLevel = ErrorLevel(512);
    pub const USER_NOTICE: ErrorLevel = ErrorLevel(1024);
    pub const STRICT: ErrorLevel = ErrorLevel(2048);
    pub const RECOVERABLE_ERROR: ErrorLevel = ErrorLevel(4096);
    pub const DEPRECATED: ErrorLevel = ErrorLevel(8192);
    pub const USER_DEPRECATED: ErrorLevel = ErrorLevel(16384);
    pub const ALL: ErrorLevel = ErrorLevel(32767);

    /// Mask notification routes use unless configured otherwise
    pub const NOTIFY_DEFAULT: ErrorLevel = ErrorLevel(1 | 2 | 4 | 64 | 256);

    pub const fn from_bits(bits: u32) -> Self {
        ErrorLevel(bits)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub const fn intersects(&self, other: ErrorLevel) -> bool {
        self.0 & other.0 != 0
    }

    pub fn category(&self) -> ErrorCategory {
        let bits = self.0;
        if bits & (Self::ERROR.0 | Self::PARSE.0 | Self::CORE_ERROR.0 | Self::COMPILE_ERROR.0) != 0 {
            ErrorCategory::Fatal
        } else if bits & (Self::USER_ERROR.0 | Self::RECOVERABLE_ERROR.0) != 0 {
            ErrorCategory::Error
        } else if bits
            & (Self::WARNING.0 | Self::CORE_WARNING.0 | Self::COMPILE_WARNING.0 | Self::USER_WARNING.0)
            != 0
        {
            ErrorCategory::Warning
        } else if bits & (Self::NOTICE.0 | Self::USER_NOTICE.0) != 0 {
            ErrorCategory::Notice
        } else if bits & (Self::DEPRECATED.0 | Self::USER_DEPRECATED.0) != 0 {
            ErrorCategory::Deprecated
        } else {
            ErrorCategory::Strict
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.category() == ErrorCategory::Fatal
    }
}

impl BitOr for ErrorLevel {
    type Output = ErrorLevel;

    fn bitor(self, rhs: ErrorLevel) -> ErrorLevel {
        ErrorLevel(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Fatal,
    Error,
    Warning,
    Notice,
    Deprecated,
    Strict,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Fatal => "fatal",
            ErrorCategory::Error => "error",
            ErrorCategory::Warning => "warning",
            ErrorCategory::Notice => "notice",
            ErrorCategory::Deprecated => "deprecated",
            ErrorCategory::Strict => "strict",
        }
    }

    /// Capitalized form used in notification titles
    pub fn label(&self) -> &'static str {
        match self {
            ErrorCategory::Fatal => "Fatal",
            ErrorCategory::Error => "Error",
            ErrorCategory::Warning => "Warning",
            ErrorCategory::Notice => "Notice",
            ErrorCategory::Deprecated => "Deprecated",
            ErrorCategory::Strict => "Strict",
        }
    }

    /// Fatal and error categories are logged with `error`, the rest with `warn`
    pub fn is_error(&self) -> bool {
        matches!(self, ErrorCategory::Fatal | ErrorCategory::Error)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-sink throttle bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ThrottleStat {
    /// Occurrences suppressed since the last send
    pub count_since: u64,
    /// Unix time of the last send
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub level: ErrorLevel,
    pub message: String,
    pub file: String,
    pub line: u32,
    #[serde(default)]
    pub backtrace: Vec<TraceFrame>,
    /// Signature of this error (type, location and message)
    pub hash: String,
    pub is_first_occur: bool,
    /// Already captured in the console log
    pub in_console: bool,
    /// The code that raised it asked for an exception instead
    pub throw: bool,
    #[serde(default)]
    pub throttle: BTreeMap<String, ThrottleStat>,
}

impl ErrorEvent {
    pub fn new(level: ErrorLevel, message: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        let message = message.into();
        let file = file.into();
        let hash = signature(level, &file, line, &message);
        Self {
            level,
            message,
            file,
            line,
            backtrace: Vec::new(),
            hash,
            is_first_occur: true,
            in_console: false,
            throw: false,
            throttle: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_backtrace(mut self, frames: Vec<TraceFrame>) -> Self {
        self.backtrace = frames;
        self
    }

    /// Restore throttle statistics persisted by the host
    #[must_use]
    pub fn with_throttle_stats(mut self, stats: BTreeMap<String, ThrottleStat>) -> Self {
        self.throttle = stats;
        self
    }

    #[must_use]
    pub fn with_throw(mut self, throw: bool) -> Self {
        self.throw = throw;
        self
    }

    pub fn category(&self) -> ErrorCategory {
        self.level.category()
    }

    pub fn is_fatal(&self) -> bool {
        self.level.is_fatal()
    }

    pub fn throttle_stat(&self, sink_key: &str) -> Option<&ThrottleStat> {
        self.throttle.get(sink_key)
    }

    pub fn throttle_stat_mut(&mut self, sink_key: &str) -> &mut ThrottleStat {
        self.throttle.entry(sink_key.to_string()).or_default()
    }

    /// `"file (line N)"`
    pub fn location(&self) -> String {
        format!("{} (line {})", self.file, self.line)
    }
}

/// Stable FNV-1a signature so persisted throttle stats survive restarts
fn signature(level: ErrorLevel, file: &str, line: u32, message: &str) -> String {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let input = format!("{}|{}|{}|{}", level.bits(), file, line, message);
    let hash = input
        .bytes()
        .fold(OFFSET, |acc, b| (acc ^ b as u64).wrapping_mul(PRIME));
    format!("{:016x}", hash)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CategoryCount {
    pub in_console: u64,
    pub not_in_console: u64,
}

impl CategoryCount {
    pub fn total(&self) -> u64 {
        self.in_console + self.not_in_console
    }
}

/// Aggregated error statistics for one request
#[derive(Debug, Clone, Default)]
pub struct ErrorSummary {
    counts: BTreeMap<ErrorCategory, CategoryCount>,
    last: Option<ErrorEvent>,
}

impl ErrorSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, error: &ErrorEvent) {
        let count = self.counts.entry(error.category()).or_default();
        if error.in_console {
            count.in_console += 1;
        } else {
            count.not_in_console += 1;
        }
        self.last = Some(error.clone());
    }

    pub fn counts(&self) -> &BTreeMap<ErrorCategory, CategoryCount> {
        &self.counts
    }

    pub fn total(&self) -> u64 {
        self.counts.values().map(CategoryCount::total).sum()
    }

    pub fn in_console(&self) -> u64 {
        self.counts.values().map(|c| c.in_console).sum()
    }

    pub fn not_in_console(&self) -> u64 {
        self.counts.values().map(|c| c.not_in_console).sum()
    }

    pub fn has_errors(&self) -> bool {
        self.total() > 0
    }

    pub fn last(&self) -> Option<&ErrorEvent> {
        self.last.as_ref()
    }
}
