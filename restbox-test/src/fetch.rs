//! Scripted fetcher.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use restbox_core::{FetchOutcome, Fetcher, RequestData};

/// Latency applied when none is configured.
pub const DEFAULT_LATENCY: Duration = Duration::from_millis(500);

type Handler = Arc<dyn Fn(&RequestData) -> Option<FetchOutcome> + Send + Sync>;

#[derive(Default)]
struct Stats {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    requests: Mutex<Vec<RequestData>>,
}

struct InFlightGuard<'a>(&'a Stats);

impl<'a> InFlightGuard<'a> {
    fn enter(stats: &'a Stats) -> Self {
        let current = stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        stats.peak_in_flight.fetch_max(current, Ordering::SeqCst);
        InFlightGuard(stats)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A fake network answering from a handler after a fixed latency.
///
/// The handler returns `None` for requests it does not know; those fail
/// with a connection error naming the url. Clones share their counters.
///
/// ```
/// use std::time::Duration;
/// use restbox_core::{FetchOutcome, Fetcher};
/// use restbox_core::request::get;
/// use restbox_test::FakeFetch;
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let fetch = FakeFetch::new(|req| match req.url() {
///     "/ping" => Some(FetchOutcome::response(200, json!("pong"))),
///     _ => None,
/// })
/// .with_latency(Duration::ZERO);
///
/// assert!(matches!(fetch.fetch(get("/ping")).await, FetchOutcome::Response { status: 200, .. }));
/// assert!(matches!(fetch.fetch(get("/nope")).await, FetchOutcome::Failed(_)));
/// assert_eq!(fetch.calls(), 2);
/// # }
/// ```
#[derive(Clone)]
pub struct FakeFetch {
    handler: Handler,
    latency: Duration,
    stats: Arc<Stats>,
}

impl FakeFetch {
    /// Creates a fake answering with `handler` after [`DEFAULT_LATENCY`].
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&RequestData) -> Option<FetchOutcome> + Send + Sync + 'static,
    {
        FakeFetch {
            handler: Arc::new(handler),
            latency: DEFAULT_LATENCY,
            stats: Arc::default(),
        }
    }

    /// Sets the latency of every call.
    pub fn with_latency(self, latency: Duration) -> Self {
        FakeFetch { latency, ..self }
    }

    /// Returns the configured latency.
    pub fn latency(&self) -> Duration {
        self.latency
    }

    /// Returns the number of calls started so far.
    pub fn calls(&self) -> usize {
        self.stats.calls.load(Ordering::SeqCst)
    }

    /// Returns the number of calls started for `url`.
    pub fn calls_for(&self, url: &str) -> usize {
        self.stats
            .requests
            .lock()
            .iter()
            .filter(|req| req.url() == url)
            .count()
    }

    /// Returns the number of calls currently waiting on their latency.
    pub fn in_flight(&self) -> usize {
        self.stats.in_flight.load(Ordering::SeqCst)
    }

    /// Returns the highest number of simultaneous calls observed.
    pub fn peak_in_flight(&self) -> usize {
        self.stats.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Returns every request received, in call order.
    pub fn requests(&self) -> Vec<RequestData> {
        self.stats.requests.lock().clone()
    }
}

impl std::fmt::Debug for FakeFetch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeFetch")
            .field("latency", &self.latency)
            .field("calls", &self.calls())
            .finish()
    }
}

#[async_trait]
impl Fetcher for FakeFetch {
    async fn fetch(&self, request: RequestData) -> FetchOutcome {
        self.stats.calls.fetch_add(1, Ordering::SeqCst);
        self.stats.requests.lock().push(request.clone());
        let outcome = {
            let _guard = InFlightGuard::enter(&self.stats);
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            (self.handler)(&request)
        };
        outcome.unwrap_or_else(|| {
            FetchOutcome::failed(format!("FakeFetch: unhandled url: {}", request.url()))
        })
    }
}
