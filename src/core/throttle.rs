//! Notification throttling
//!
//! The throttle state lives on the [`ErrorEvent`] itself, keyed by sink, so
//! the same error reaching several sinks is throttled independently per sink.

use super::error_event::{ErrorEvent, ErrorLevel};
use chrono::Utc;

/// Why [`ErrorThrottle::check_at`] rejected an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    Send,
    /// The raising code asked for an exception
    Thrown,
    /// Error type not in the sink's mask
    Masked,
    /// Not the first occurrence of this signature
    Repeat,
    /// Already captured in the console log
    InConsole,
    /// Sent for this sink within the throttle window
    Throttled,
}

#[derive(Debug, Clone)]
pub struct ErrorThrottle {
    sink_key: String,
    throttle_min: u32,
    error_mask: ErrorLevel,
}

impl ErrorThrottle {
    pub fn new(sink_key: impl Into<String>, throttle_min: u32, error_mask: ErrorLevel) -> Self {
        Self {
            sink_key: sink_key.into(),
            throttle_min,
            error_mask,
        }
    }

    pub fn sink_key(&self) -> &str {
        &self.sink_key
    }

    pub fn should_send(&self, error: &mut ErrorEvent) -> bool {
        self.check(error) == ThrottleDecision::Send
    }

    pub fn should_send_at(&self, error: &mut ErrorEvent, now: i64) -> bool {
        self.check_at(error, now) == ThrottleDecision::Send
    }

    pub fn check(&self, error: &mut ErrorEvent) -> ThrottleDecision {
        self.check_at(error, Utc::now().timestamp())
    }

    /// Decide, and record the send right away when the answer is [`ThrottleDecision::Send`]
    pub fn check_at(&self, error: &mut ErrorEvent, now: i64) -> ThrottleDecision {
        let decision = self.decide_at(error, now);
        if decision == ThrottleDecision::Send {
            self.record_sent_at(error, now);
        }
        decision
    }

    pub fn decide(&self, error: &mut ErrorEvent) -> ThrottleDecision {
        self.decide_at(error, Utc::now().timestamp())
    }

    /// Decide without committing a send
    ///
    /// Throttled repeats bump `count_since`; the window only moves once
    /// [`ErrorThrottle::record_sent_at`] confirms a delivery.
    pub fn decide_at(&self, error: &mut ErrorEvent, now: i64) -> ThrottleDecision {
        if error.throw {
            return ThrottleDecision::Thrown;
        }
        if !error.level.intersects(self.error_mask) {
            return ThrottleDecision::Masked;
        }
        if !error.is_first_occur {
            return ThrottleDecision::Repeat;
        }
        if error.in_console {
            return ThrottleDecision::InConsole;
        }

        let window_start = now - i64::from(self.throttle_min) * 60;
        let last_sent = error.throttle_stat(&self.sink_key).and_then(|stat| stat.timestamp);
        match last_sent {
            Some(last) if last > window_start => {
                error.throttle_stat_mut(&self.sink_key).count_since += 1;
                ThrottleDecision::Throttled
            }
            _ => ThrottleDecision::Send,
        }
    }

    pub fn record_sent(&self, error: &mut ErrorEvent) {
        self.record_sent_at(error, Utc::now().timestamp());
    }

    /// Start a new window for this sink
    pub fn record_sent_at(&self, error: &mut ErrorEvent, now: i64) {
        let stat = error.throttle_stat_mut(&self.sink_key);
        stat.timestamp = Some(now);
        stat.count_since = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warning() -> ErrorEvent {
        ErrorEvent::new(ErrorLevel::WARNING, "Division by zero", "/app/calc.rs", 42)
    }

    #[test]
    fn test_first_send_allowed() {
        let throttle = ErrorThrottle::new("slack", 60, ErrorLevel::NOTIFY_DEFAULT);
        let mut err = warning();
        assert!(throttle.should_send_at(&mut err, 1_000_000));
        assert_eq!(err.throttle_stat("slack").unwrap().timestamp, Some(1_000_000));
    }

    #[test]
    fn test_window() {
        let throttle = ErrorThrottle::new("slack", 60, ErrorLevel::NOTIFY_DEFAULT);
        let mut err = warning();
        let start = 1_000_000;

        assert!(throttle.should_send_at(&mut err, start));
        for i in 1..=4 {
            assert!(!throttle.should_send_at(&mut err, start + i * 60));
        }
        assert_eq!(err.throttle_stat("slack").unwrap().count_since, 4);

        assert!(throttle.should_send_at(&mut err, start + 3600));
        let stat = err.throttle_stat("slack").unwrap();
        assert_eq!(stat.count_since, 0);
        assert_eq!(stat.timestamp, Some(start + 3600));
    }

    #[test]
    fn test_rejections() {
        let throttle = ErrorThrottle::new("discord", 60, ErrorLevel::NOTIFY_DEFAULT);

        let mut err = warning().with_throw(true);
        assert_eq!(throttle.check_at(&mut err, 0), ThrottleDecision::Thrown);

        let mut err = ErrorEvent::new(ErrorLevel::NOTICE, "n", "f", 1);
        assert_eq!(throttle.check_at(&mut err, 0), ThrottleDecision::Masked);

        let mut err = warning();
        err.is_first_occur = false;
        assert_eq!(throttle.check_at(&mut err, 0), ThrottleDecision::Repeat);

        let mut err = warning();
        err.in_console = true;
        assert_eq!(throttle.check_at(&mut err, 0), ThrottleDecision::InConsole);
        assert!(err.throttle_stat("discord").is_none());
    }

    #[test]
    fn test_sinks_are_independent() {
        let slack = ErrorThrottle::new("slack", 60, ErrorLevel::NOTIFY_DEFAULT);
        let discord = ErrorThrottle::new("discord", 60, ErrorLevel::NOTIFY_DEFAULT);
        let mut err = warning();

        assert!(slack.should_send_at(&mut err, 100));
        assert!(discord.should_send_at(&mut err, 100));
        assert!(!slack.should_send_at(&mut err, 101));
        assert!(!discord.should_send_at(&mut err, 101));
    }

    #[test]
    fn test_decide_does_not_open_window() {
        let throttle = ErrorThrottle::new("slack", 60, ErrorLevel::NOTIFY_DEFAULT);
        let mut err = warning();

        assert_eq!(throttle.decide_at(&mut err, 500), ThrottleDecision::Send);
        assert_eq!(throttle.decide_at(&mut err, 501), ThrottleDecision::Send);
        assert!(err.throttle_stat("slack").is_none());

        throttle.record_sent_at(&mut err, 501);
        assert_eq!(throttle.decide_at(&mut err, 502), ThrottleDecision::Throttled);
        assert_eq!(err.throttle_stat("slack").unwrap().count_since, 1);
    }
}
