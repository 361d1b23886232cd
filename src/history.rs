//! Bounded command history, most recent first

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Default number of commands kept
pub const DEFAULT_CAPACITY: usize = 100;

/// One received command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandRecord {
    pub text: String,
    pub context: String,
    pub timestamp: DateTime<Utc>,
}

/// Ring of recent commands
#[derive(Debug, Clone)]
pub struct HistoryLedger {
    entries: VecDeque<CommandRecord>,
    capacity: usize,
}

impl Default for HistoryLedger {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl HistoryLedger {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            capacity,
        }
    }

    /// Record a command at the front, evicting the oldest past capacity
    pub fn record(&mut self, text: &str, context: &str) {
        self.entries.push_front(CommandRecord {
            text: text.to_string(),
            context: context.to_string(),
            timestamp: Utc::now(),
        });
        self.entries.truncate(self.capacity);
    }

    /// Up to `limit` most recent commands, newest first
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<CommandRecord> {
        self.entries.iter().take(limit).cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}
