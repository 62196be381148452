//! Metrics declaration and recording helpers.
//!
//! Every helper is a no-op when the `metrics` feature is disabled.

use std::time::Duration;

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
lazy_static! {
    /// Track number of fresh cache reads.
    pub static ref CACHE_HIT_COUNTER: &'static str = {
        metrics::describe_counter!(
            "restbox_cache_hit_total",
            "Total number of queries answered from the cache."
        );
        "restbox_cache_hit_total"
    };
    /// Track number of cache misses, expired entries included.
    pub static ref CACHE_MISS_COUNTER: &'static str = {
        metrics::describe_counter!(
            "restbox_cache_miss_total",
            "Total number of queries that had to fetch."
        );
        "restbox_cache_miss_total"
    };
    /// Track number of queries that joined an in-flight request.
    pub static ref REQUEST_JOINED_COUNTER: &'static str = {
        metrics::describe_counter!(
            "restbox_request_joined_total",
            "Total number of queries that joined an in-flight request."
        );
        "restbox_request_joined_total"
    };
    /// Track number of entries removed by explicit deletion.
    pub static ref CACHE_EVICTED_COUNTER: &'static str = {
        metrics::describe_counter!(
            "restbox_cache_evicted_total",
            "Total number of cache entries deleted."
        );
        "restbox_cache_evicted_total"
    };
    /// Track number of mutations by classified tag.
    pub static ref MUTATION_COUNTER: &'static str = {
        metrics::describe_counter!(
            "restbox_mutation_total",
            "Total number of mutations."
        );
        "restbox_mutation_total"
    };
    /// Histogram of fetch duration.
    pub static ref FETCH_DURATION: &'static str = {
        metrics::describe_histogram!(
            "restbox_fetch_duration_seconds",
            metrics::Unit::Seconds,
            "Duration of fetcher calls in seconds."
        );
        "restbox_fetch_duration_seconds"
    };
    /// Gauge of requests currently in flight.
    pub static ref IN_FLIGHT: &'static str = {
        metrics::describe_gauge!(
            "restbox_in_flight",
            "Number of deduplicated requests currently in flight."
        );
        "restbox_in_flight"
    };
}

#[cfg(feature = "metrics")]
#[inline]
pub(crate) fn record_hit(name: &str) {
    metrics::counter!(*CACHE_HIT_COUNTER, "name" => name.to_string()).increment(1);
}

#[cfg(not(feature = "metrics"))]
#[inline]
pub(crate) fn record_hit(_name: &str) {}

#[cfg(feature = "metrics")]
#[inline]
pub(crate) fn record_miss(name: &str) {
    metrics::counter!(*CACHE_MISS_COUNTER, "name" => name.to_string()).increment(1);
}

#[cfg(not(feature = "metrics"))]
#[inline]
pub(crate) fn record_miss(_name: &str) {}

#[cfg(feature = "metrics")]
#[inline]
pub(crate) fn record_joined(name: &str) {
    metrics::counter!(*REQUEST_JOINED_COUNTER, "name" => name.to_string()).increment(1);
}

#[cfg(not(feature = "metrics"))]
#[inline]
pub(crate) fn record_joined(_name: &str) {}

#[cfg(feature = "metrics")]
#[inline]
pub(crate) fn record_evicted(count: usize) {
    metrics::counter!(*CACHE_EVICTED_COUNTER).increment(count as u64);
}

#[cfg(not(feature = "metrics"))]
#[inline]
pub(crate) fn record_evicted(_count: usize) {}

#[cfg(feature = "metrics")]
#[inline]
pub(crate) fn record_mutation(name: &str, kind: &str) {
    metrics::counter!(
        *MUTATION_COUNTER,
        "name" => name.to_string(),
        "kind" => kind.to_string()
    )
    .increment(1);
}

#[cfg(not(feature = "metrics"))]
#[inline]
pub(crate) fn record_mutation(_name: &str, _kind: &str) {}

#[cfg(feature = "metrics")]
#[inline]
pub(crate) fn record_fetch(name: &str, duration: Duration) {
    metrics::histogram!(*FETCH_DURATION, "name" => name.to_string())
        .record(duration.as_secs_f64());
}

#[cfg(not(feature = "metrics"))]
#[inline]
pub(crate) fn record_fetch(_name: &str, _duration: Duration) {}

#[cfg(feature = "metrics")]
#[inline]
pub(crate) fn in_flight_increment() {
    metrics::gauge!(*IN_FLIGHT).increment(1.0);
}

#[cfg(not(feature = "metrics"))]
#[inline]
pub(crate) fn in_flight_increment() {}

#[cfg(feature = "metrics")]
#[inline]
pub(crate) fn in_flight_decrement() {
    metrics::gauge!(*IN_FLIGHT).decrement(1.0);
}

#[cfg(not(feature = "metrics"))]
#[inline]
pub(crate) fn in_flight_decrement() {}
