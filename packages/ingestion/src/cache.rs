//! A single cached value with a freshness window.
//!
//! Used for operator-tunable configuration that lives in the store (the
//! harvest system prompt): reads within `max_age` of the last fill hit
//! the cache, anything older falls through to the source of truth.

use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex};

/// Time source seam so staleness is testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

struct Cached<T> {
    value: T,
    fetched_at: DateTime<Utc>,
}

/// One value plus the instant it was cached.
pub struct TtlCache<T> {
    slot: Mutex<Option<Cached<T>>>,
    max_age: Duration,
    clock: Arc<dyn Clock>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(max_age: Duration) -> Self {
        Self::with_clock(max_age, Arc::new(SystemClock))
    }

    pub fn with_clock(max_age: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            slot: Mutex::new(None),
            max_age,
            clock,
        }
    }

    /// The cached value, or `None` when empty or older than `max_age`.
    pub fn get(&self) -> Option<T> {
        let slot = self.slot.lock().ok()?;
        let cached = slot.as_ref()?;
        if self.clock.now() - cached.fetched_at > self.max_age {
            return None;
        }
        Some(cached.value.clone())
    }

    /// Store a fresh value, replacing whatever was cached.
    pub fn put(&self, value: T) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(Cached {
                value,
                fetched_at: self.clock.now(),
            });
        }
    }

    /// Drop the cached value so the next read refetches.
    pub fn invalidate(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }
}
