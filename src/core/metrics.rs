//! Output metrics for observability
//!
//! Counters for monitoring the console's routing health: how many entries
//! were rendered, how many renders or whole route passes failed, and what
//! happened to error notifications.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for console observability
///
/// # Example
///
/// ```
/// use debug_console::OutputMetrics;
///
/// let metrics = OutputMetrics::new();
/// metrics.record_rendered();
/// metrics.record_entry_failed();
///
/// assert_eq!(metrics.entries_rendered(), 1);
/// assert_eq!(metrics.entries_failed(), 1);
/// ```
#[derive(Debug)]
pub struct OutputMetrics {
    /// Completed output passes
    passes: AtomicU64,

    /// Entries handed to a route renderer successfully
    entries_rendered: AtomicU64,

    /// Entries whose render returned an error
    entries_failed: AtomicU64,

    /// Route passes that failed or panicked
    routes_failed: AtomicU64,

    /// Notifications delivered to a sink
    notifications_sent: AtomicU64,

    /// Notifications rejected by a throttle
    notifications_suppressed: AtomicU64,
}

impl OutputMetrics {
    /// Create a new metrics instance with all counters at zero
    pub const fn new() -> Self {
        Self {
            passes: AtomicU64::new(0),
            entries_rendered: AtomicU64::new(0),
            entries_failed: AtomicU64::new(0),
            routes_failed: AtomicU64::new(0),
            notifications_sent: AtomicU64::new(0),
            notifications_suppressed: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn entries_rendered(&self) -> u64 {
        self.entries_rendered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn entries_failed(&self) -> u64 {
        self.entries_failed.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn routes_failed(&self) -> u64 {
        self.routes_failed.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn notifications_sent(&self) -> u64 {
        self.notifications_sent.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn notifications_suppressed(&self) -> u64 {
        self.notifications_suppressed.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn record_pass(&self) -> u64 {
        self.passes.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_rendered(&self) -> u64 {
        self.entries_rendered.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_entry_failed(&self) -> u64 {
        self.entries_failed.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_route_failed(&self) -> u64 {
        self.routes_failed.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_notification_sent(&self) -> u64 {
        self.notifications_sent.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_notification_suppressed(&self) -> u64 {
        self.notifications_suppressed.fetch_add(1, Ordering::Relaxed)
    }

    /// Failed renders as a percentage (0.0 - 100.0)
    ///
    /// Returns 0.0 if nothing has been rendered.
    pub fn failure_rate(&self) -> f64 {
        let failed = self.entries_failed() as f64;
        let total = failed + self.entries_rendered() as f64;
        if total == 0.0 {
            0.0
        } else {
            failed / total * 100.0
        }
    }
}

impl Default for OutputMetrics {
    fn default() -> Self {
        Self::new()
    }
}
