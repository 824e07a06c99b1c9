use crate::session::effect::LogEntry;

use std::collections::VecDeque;

pub const MAX_LOG_ENTRIES: usize = 1000;

/// Output log keeping only the most recent entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputLog {
    entries: VecDeque<LogEntry>,
}

impl OutputLog {
    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > MAX_LOG_ENTRIES {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
