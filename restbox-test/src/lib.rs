//! Test harness shared by the restbox crates.
//!
//! - [`FakeFetch`]: a scripted fetcher with latency and call counters
//! - [`ManualClock`] and [`TokioClock`]: clocks tests can drive
//! - [`tracing::create_span_collector`](crate::tracing::create_span_collector): captures spans and events

pub mod clock;
pub mod fetch;
pub mod tracing;

pub use clock::{ManualClock, TokioClock};
pub use fetch::{DEFAULT_LATENCY, FakeFetch};
