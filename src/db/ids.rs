use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use chrono::Utc;

/// Source of todo ids. Implementations must never hand out the same id twice
/// within one process.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Millisecond timestamps, bumped past the previous id whenever the clock has
/// not moved on. Ids stay numeric strings ordered by creation time.
#[derive(Debug, Default)]
pub struct MonotonicIds {
    last: AtomicI64,
}

impl MonotonicIds {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for MonotonicIds {
    fn next_id(&self) -> String {
        let now = Utc::now().timestamp_millis();
        let mut prev = self.last.load(Ordering::Acquire);
        loop {
            let candidate = now.max(prev + 1);
            match self
                .last
                .compare_exchange_weak(prev, candidate, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return candidate.to_string(),
                Err(actual) => prev = actual,
            }
        }
    }
}

/// Plain counter, handy when ids need to be predictable.
#[derive(Debug)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl SequentialIds {
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> String {
        self.next.fetch_add(1, Ordering::Relaxed).to_string()
    }
}
