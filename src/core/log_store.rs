//! Request-scoped log containers
//!
//! Entries live in one of three ordered containers: alerts (always rendered
//! first), the summary (a priority → entries map rendered highest priority
//! first) and the chronological main log.

use super::log_entry::LogEntry;
use std::collections::BTreeMap;

/// Which group stack / container an entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StackKey {
    Main,
    Summary(i32),
}

#[derive(Debug, Clone, Default)]
pub struct LogStore {
    alerts: Vec<LogEntry>,
    log: Vec<LogEntry>,
    log_summary: BTreeMap<i32, Vec<LogEntry>>,
}

impl LogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> &[LogEntry] {
        &self.alerts
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    pub fn log_summary(&self) -> &BTreeMap<i32, Vec<LogEntry>> {
        &self.log_summary
    }

    pub fn push_alert(&mut self, entry: LogEntry) {
        self.alerts.push(entry);
    }

    pub fn push(&mut self, key: StackKey, entry: LogEntry) {
        self.container_mut(key).push(entry);
    }

    pub fn container(&self, key: StackKey) -> &[LogEntry] {
        match key {
            StackKey::Main => &self.log,
            StackKey::Summary(priority) => self
                .log_summary
                .get(&priority)
                .map(Vec::as_slice)
                .unwrap_or(&[]),
        }
    }

    pub fn container_mut(&mut self, key: StackKey) -> &mut Vec<LogEntry> {
        match key {
            StackKey::Main => &mut self.log,
            StackKey::Summary(priority) => self.log_summary.entry(priority).or_default(),
        }
    }

    pub fn len(&self) -> usize {
        self.alerts.len() + self.log.len() + self.log_summary.values().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.alerts.clear();
        self.log.clear();
        self.log_summary.clear();
    }

    /// Ordered copy of all three containers
    pub fn snapshot(&self) -> LogSnapshot {
        LogSnapshot {
            alerts: self.alerts.clone(),
            summary: self
                .log_summary
                .iter()
                .rev()
                .filter(|(_, entries)| !entries.is_empty())
                .map(|(priority, entries)| (*priority, entries.clone()))
                .collect(),
            log: self.log.clone(),
        }
    }
}

/// Immutable view handed to routes during one output pass
#[derive(Debug, Clone, Default)]
pub struct LogSnapshot {
    alerts: Vec<LogEntry>,
    summary: Vec<(i32, Vec<LogEntry>)>,
    log: Vec<LogEntry>,
}

impl LogSnapshot {
    pub fn alerts(&self) -> &[LogEntry] {
        &self.alerts
    }

    /// Summary groups, highest priority first
    pub fn summary(&self) -> &[(i32, Vec<LogEntry>)] {
        &self.summary
    }

    pub fn summary_entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.summary.iter().flat_map(|(_, entries)| entries.iter())
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    /// Alerts, then summary, then log
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.alerts
            .iter()
            .chain(self.summary_entries())
            .chain(self.log.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty() && self.summary.is_empty() && self.log.is_empty()
    }
}
