//! Unique file-name generation for transient sources and chart outputs.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

/// Produces file stems that do not repeat within a process.
///
/// Returned names never contain a `.`, so an extension can be appended
/// without clobbering part of the name.
pub trait NameSource: Send + Sync {
    fn next_name(&self, prefix: &str) -> String;
}

/// `prefix_<UTC timestamp, ms>_<counter>`: readable and sortable.
///
/// The timestamp alone collides when two renders land in the same
/// millisecond; the process-local counter breaks the tie.
#[derive(Debug, Default)]
pub struct TimestampNames {
    counter: AtomicU64,
}

impl TimestampNames {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NameSource for TimestampNames {
    fn next_name(&self, prefix: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{prefix}_{}_{n:04}", Utc::now().format("%Y%m%d%H%M%S%3f"))
    }
}

/// `prefix_<n>` from a counter; deterministic, for tests.
#[derive(Debug, Default)]
pub struct SequentialNames {
    next: AtomicU64,
}

impl SequentialNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start),
        }
    }
}

impl NameSource for SequentialNames {
    fn next_name(&self, prefix: &str) -> String {
        format!("{prefix}_{}", self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// `prefix_<uuid>`; unique across processes sharing a work directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidNames;

impl NameSource for UuidNames {
    fn next_name(&self, prefix: &str) -> String {
        format!("{prefix}_{}", uuid::Uuid::new_v4().simple())
    }
}
