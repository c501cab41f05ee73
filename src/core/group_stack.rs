//! Nested group bookkeeping
//!
//! Every `group` / `groupCollapsed` pushes a frame onto the stack of the
//! container currently being logged to; `groupEnd` pops it. `groupSummary`
//! switches logging into a summary priority until its matching `groupEnd`.

use super::log_entry::{LogEntry, Method};
use super::log_store::StackKey;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupFrame {
    pub channel: String,
    /// Whether the opening entry was actually recorded
    pub collecting: bool,
}

/// Result of [`GroupStack::pop`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupPop {
    /// A group frame was closed
    Group(GroupFrame),
    /// No open group; the innermost summary section was closed instead
    Summary(i32),
    /// Nothing was open
    Empty,
}

#[derive(Debug, Clone, Default)]
pub struct GroupStack {
    stacks: BTreeMap<StackKey, Vec<GroupFrame>>,
    priorities: Vec<i32>,
}

impl GroupStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Container new entries are appended to
    pub fn current_key(&self) -> StackKey {
        match self.priorities.last() {
            Some(priority) => StackKey::Summary(*priority),
            None => StackKey::Main,
        }
    }

    pub fn push(&mut self, frame: GroupFrame) {
        let key = self.current_key();
        self.stacks.entry(key).or_default().push(frame);
    }

    pub fn pop(&mut self) -> GroupPop {
        let key = self.current_key();
        if let Some(frame) = self.stacks.get_mut(&key).and_then(Vec::pop) {
            return GroupPop::Group(frame);
        }
        match self.priorities.pop() {
            Some(priority) => GroupPop::Summary(priority),
            None => GroupPop::Empty,
        }
    }

    pub fn open_summary(&mut self, priority: i32) {
        self.priorities.push(priority);
    }

    pub fn depth(&self, key: StackKey) -> usize {
        self.stacks.get(&key).map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.priorities.is_empty() && self.stacks.values().all(Vec::is_empty)
    }

    /// Synthetic `groupEnd` entries for every open collecting frame
    ///
    /// Frames are closed innermost first, each entry paired with the container
    /// it belongs to. Calling it again without new groups yields nothing.
    pub fn close_all(&mut self) -> Vec<(StackKey, LogEntry)> {
        let mut closing = Vec::new();
        for (key, frames) in self.stacks.iter_mut() {
            while let Some(frame) = frames.pop() {
                if frame.collecting {
                    closing.push((*key, LogEntry::new(frame.channel, Method::GroupEnd, Vec::new())));
                }
            }
        }
        self.stacks.clear();
        self.priorities.clear();
        closing
    }
}

/// Indexes of the group openers in `entries` that have no matching `groupEnd`
pub fn open_group_indexes(entries: &[LogEntry]) -> Vec<usize> {
    let mut open = Vec::new();
    for (idx, entry) in entries.iter().enumerate() {
        if entry.method.opens_group() {
            open.push(idx);
        } else if entry.method == Method::GroupEnd {
            open.pop();
        }
    }
    open
}
