// src/supervisor/log_buffer.rs

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One captured line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.message
        )
    }
}

#[derive(Debug)]
struct Inner {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    /// Total entries ever appended; never decreases.
    appended: u64,
}

/// Bounded, oldest-evicted log shared between the drainer and readers.
///
/// Clones share the same buffer. Append and eviction happen under one lock
/// acquisition, so readers never see more than `capacity` entries.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    inner: Arc<Mutex<Inner>>,
}

impl LogBuffer {
    /// A capacity of zero is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: VecDeque::with_capacity(capacity),
                capacity,
                appended: 0,
            })),
        }
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Timestamp `message` and append it, evicting the oldest entry if full.
    pub fn push(&self, message: impl Into<String>) {
        let entry = LogEntry {
            timestamp: Local::now(),
            message: message.into(),
        };

        let mut inner = self.lock();
        if inner.entries.len() == inner.capacity {
            inner.entries.pop_front();
        }
        inner.entries.push_back(entry);
        inner.appended += 1;
    }

    /// The last `count` entries, oldest first, formatted as
    /// `[YYYY-MM-DD HH:MM:SS] message`.
    pub fn recent(&self, count: usize) -> Vec<String> {
        let inner = self.lock();
        let skip = inner.entries.len().saturating_sub(count);
        inner.entries.iter().skip(skip).map(|e| e.to_string()).collect()
    }

    /// Most recent entry, formatted.
    pub fn last(&self) -> Option<String> {
        self.lock().entries.back().map(|e| e.to_string())
    }

    /// Position marker for [`since`](Self::since).
    pub fn mark(&self) -> u64 {
        self.lock().appended
    }

    /// Entries appended after `mark` that are still retained, plus the mark
    /// to pass next time.
    pub fn since(&self, mark: u64) -> (Vec<LogEntry>, u64) {
        let inner = self.lock();
        let fresh = usize::try_from(inner.appended.saturating_sub(mark)).unwrap_or(usize::MAX);
        let skip = inner.entries.len().saturating_sub(fresh);
        let entries = inner.entries.iter().skip(skip).cloned().collect();
        (entries, inner.appended)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panicking reader cannot leave the deque half-updated.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
