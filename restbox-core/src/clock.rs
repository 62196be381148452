//! Time source for TTL and bookkeeping.

use chrono::{DateTime, Utc};

/// Source of the current time.
///
/// The cache store reads the clock for every lookup and every settlement, so
/// tests can drive expiry deterministically with a manual implementation.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock backed by [`Utc::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
