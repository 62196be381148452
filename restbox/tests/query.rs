//! Query path: deduplication, TTL and classification.

use std::sync::Arc;
use std::time::Duration;

use restbox::prelude::*;
use restbox::{ApiError, DEFAULT_TTL, ResponseData};
use restbox_test::{FakeFetch, ManualClock, TokioClock};
use serde_json::json;

fn users(latency: Duration) -> FakeFetch {
    FakeFetch::new(|req| match req.url() {
        "/a" => Some(FetchOutcome::response(200, json!({"name": "a"}))),
        "/missing" => Some(FetchOutcome::response(404, json!({"error": "nope"}))),
        "/down" => Some(FetchOutcome::failed("connection refused")),
        "/garbled" => Some(FetchOutcome::json_parse_error("expected value")),
        _ => None,
    })
    .with_latency(latency)
}

fn by_url() -> Query<&'static str> {
    Query::new("by_url", get, Matchers::new().on_success())
}

#[tokio::test(start_paused = true)]
async fn concurrent_queries_share_one_fetch() {
    let fetch = users(Duration::from_millis(50));
    let api = Api::builder()
        .fetcher(fetch.clone())
        .grouper(StatusGroups)
        .clock(Arc::new(TokioClock::new(chrono::Utc::now())))
        .build();
    let query = by_url();

    let first = tokio::spawn(api.query(&query, "/a"));
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(api.in_flight(), 1);
    let second = tokio::spawn(api.query(&query, "/a"));

    let started = tokio::time::Instant::now();
    let (first, second) = (first.await.unwrap(), second.await.unwrap());
    assert!(started.elapsed() < Duration::from_millis(50));

    assert_eq!(first.unwrap(), group(SUCCESS, json!({"name": "a"})));
    assert_eq!(second.unwrap(), group(SUCCESS, json!({"name": "a"})));
    assert_eq!(fetch.calls(), 1);
    assert_eq!(api.in_flight(), 0);

    let item = api.cache().peek(&"/a".into()).expect("stored");
    assert!(item.loading_dur() >= Duration::from_millis(50));
}

#[tokio::test(start_paused = true)]
async fn many_waiters_one_call() {
    let fetch = users(Duration::from_millis(20));
    let api = Api::builder()
        .fetcher(fetch.clone())
        .grouper(StatusGroups)
        .build();
    let query = by_url();

    let handles: Vec<_> = (0..16).map(|_| tokio::spawn(api.query(&query, "/a"))).collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().tag(), SUCCESS);
    }
    assert_eq!(fetch.calls(), 1);
    assert_eq!(fetch.peak_in_flight(), 1);
}

#[tokio::test]
async fn ttl_boundary_refetches() {
    let clock = ManualClock::starting_now();
    let fetch = users(Duration::ZERO);
    let api = Api::builder()
        .fetcher(fetch.clone())
        .grouper(StatusGroups)
        .clock(Arc::new(clock.clone()))
        .build();
    let query = Query::new(
        "short",
        |url: &'static str| get(url).with_ttl(Duration::from_millis(1000)),
        Matchers::new().on_success(),
    );

    api.query(&query, "/a").await.unwrap();
    clock.advance(Duration::from_millis(999));
    api.query(&query, "/a").await.unwrap();
    assert_eq!(fetch.calls(), 1);

    clock.advance(Duration::from_millis(1));
    api.query(&query, "/a").await.unwrap();
    assert_eq!(fetch.calls(), 2);
}

#[tokio::test]
async fn default_ttl_comes_from_config() {
    let clock = ManualClock::starting_now();
    let fetch = users(Duration::ZERO);
    let api = Api::builder()
        .fetcher(fetch.clone())
        .grouper(StatusGroups)
        .clock(Arc::new(clock.clone()))
        .config(ApiConfig::with_default_ttl(Duration::from_secs(2)))
        .build();
    let query = by_url();

    api.query(&query, "/a").await.unwrap();
    clock.advance(Duration::from_secs(2));
    api.query(&query, "/a").await.unwrap();
    assert_eq!(fetch.calls(), 2);
}

#[tokio::test]
async fn builtin_ttl_applies_without_config() {
    let clock = ManualClock::starting_now();
    let fetch = users(Duration::ZERO);
    let api = Api::builder()
        .fetcher(fetch.clone())
        .grouper(StatusGroups)
        .clock(Arc::new(clock.clone()))
        .build();
    let query = by_url();

    api.query(&query, "/a").await.unwrap();
    clock.advance(DEFAULT_TTL - Duration::from_millis(1));
    api.query(&query, "/a").await.unwrap();
    assert_eq!(fetch.calls(), 1);
    clock.advance(Duration::from_millis(1));
    api.query(&query, "/a").await.unwrap();
    assert_eq!(fetch.calls(), 2);
}

#[tokio::test]
async fn zero_ttl_never_caches() {
    let fetch = users(Duration::ZERO);
    let api = Api::builder()
        .fetcher(fetch.clone())
        .grouper(StatusGroups)
        .build();
    let query = Query::new(
        "live",
        |url: &'static str| get(url).with_ttl(Duration::ZERO),
        Matchers::new().on_success(),
    );

    api.query(&query, "/a").await.unwrap();
    api.query(&query, "/a").await.unwrap();
    assert_eq!(fetch.calls(), 2);
    assert!(api.cache().is_empty());
}

#[tokio::test]
async fn unmatched_variant_is_stored_and_returned() {
    let fetch = users(Duration::ZERO);
    let api = Api::builder()
        .fetcher(fetch.clone())
        .grouper(StatusGroups)
        .build();
    let query = by_url();

    let err = api.query(&query, "/missing").await.unwrap_err();
    assert_eq!(err.kind(), "404");
    assert!(matches!(err, ApiError::Unmatched { .. }));

    let again = api.query(&query, "/missing").await.unwrap_err();
    assert_eq!(again.kind(), "404");
    assert_eq!(fetch.calls(), 1);

    let item = api.cache().peek(&"/missing".into()).expect("error entry");
    assert!(item.response().is_none());
    assert!(item.error().is_some());
}

#[tokio::test]
async fn custom_grouper_names_the_unmatched_variant() {
    let fetch = users(Duration::ZERO);
    let api = Api::builder()
        .fetcher(fetch)
        .grouper(|res: &ResponseData| match res.status {
            200 => group(SUCCESS, res.response_value.clone()),
            _ => group("notfound", res.response_value.clone()),
        })
        .build();

    let err = api.query(&by_url(), "/missing").await.unwrap_err();
    assert_eq!(err.kind(), "notfound");
    assert_eq!(
        err.to_string(),
        "unhandled response variant `notfound` (status 404)"
    );
}

#[tokio::test]
async fn transport_failures_are_classified() {
    let api = Api::builder()
        .fetcher(users(Duration::ZERO))
        .grouper(StatusGroups)
        .build();
    let query = by_url();

    let down = api.query(&query, "/down").await.unwrap_err();
    assert_eq!(down.kind(), restbox::FAILED);
    assert_eq!(down.request().url(), "/down");

    let garbled = api.query(&query, "/garbled").await.unwrap_err();
    assert_eq!(garbled.kind(), restbox::UNACCEPTABLE_RESPONSE);
}

#[tokio::test]
async fn operations_with_the_same_url_share_an_entry() {
    let fetch = users(Duration::ZERO);
    let api = Api::builder()
        .fetcher(fetch.clone())
        .grouper(StatusGroups)
        .build();
    let plain = by_url();
    let renamed = Query::new(
        "renamed",
        get,
        Matchers::new().proxy_as(SUCCESS, "renamed"),
    );

    let first = api.query(&plain, "/a").await.unwrap();
    let second = api.query(&renamed, "/a").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(fetch.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_first_caller_does_not_cancel_the_fetch() {
    let fetch = users(Duration::from_millis(50));
    let api = Api::builder()
        .fetcher(fetch.clone())
        .grouper(StatusGroups)
        .build();
    let query = by_url();

    let first = tokio::spawn(api.query(&query, "/a"));
    tokio::time::sleep(Duration::from_millis(10)).await;
    first.abort();
    let second = api.query(&query, "/a").await.unwrap();

    assert_eq!(second.tag(), SUCCESS);
    assert_eq!(fetch.calls(), 1);
    assert!(api.cache().contains_key(&"/a".into()));
}

#[tokio::test]
async fn shared_cache_between_engines() {
    let cache = Arc::new(QueryCache::new());
    let fetch = users(Duration::ZERO);
    let one = Api::builder()
        .fetcher(fetch.clone())
        .grouper(StatusGroups)
        .cache(cache.clone())
        .build();
    let two = Api::builder()
        .fetcher(fetch.clone())
        .grouper(StatusGroups)
        .cache(cache)
        .build();

    one.query(&by_url(), "/a").await.unwrap();
    two.query(&by_url(), "/a").await.unwrap();
    assert_eq!(fetch.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn panicked_fetch_is_retried_by_a_single_waiter() {
    let attempts = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let seen = attempts.clone();
    let fetch = FakeFetch::new(move |_| {
        if seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
            panic!("transport exploded");
        }
        Some(FetchOutcome::response(200, json!("recovered")))
    })
    .with_latency(Duration::from_millis(50));
    let api = Api::builder()
        .fetcher(fetch.clone())
        .grouper(StatusGroups)
        .build();
    let query = by_url();

    let owner = tokio::spawn(api.query(&query, "/a"));
    tokio::time::sleep(Duration::from_millis(5)).await;
    let waiters: Vec<_> = (0..3).map(|_| tokio::spawn(api.query(&query, "/a"))).collect();

    assert!(owner.await.unwrap_err().is_panic());
    for waiter in waiters {
        assert_eq!(
            waiter.await.unwrap().unwrap(),
            group(SUCCESS, json!("recovered"))
        );
    }
    assert_eq!(fetch.calls(), 2);
    assert_eq!(fetch.peak_in_flight(), 1);
    assert_eq!(api.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn repeated_panics_never_overlap_transport_calls() {
    let fetch = FakeFetch::new(|_| panic!("transport exploded"))
        .with_latency(Duration::from_millis(50));
    let api = Api::builder()
        .fetcher(fetch.clone())
        .grouper(StatusGroups)
        .build();
    let query = by_url();

    let callers: Vec<_> = (0..4).map(|_| tokio::spawn(api.query(&query, "/a"))).collect();
    for caller in callers {
        assert!(caller.await.unwrap_err().is_panic());
    }
    assert_eq!(fetch.calls(), 4);
    assert_eq!(fetch.peak_in_flight(), 1);
}
