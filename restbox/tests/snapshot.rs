//! Snapshot export and import.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use restbox::prelude::*;
use restbox::{CacheKey, Snapshot, SystemClock};
use restbox_test::{FakeFetch, ManualClock};
use serde_json::json;

fn fetch() -> FakeFetch {
    FakeFetch::new(|req| match req.url() {
        "/bad" => Some(FetchOutcome::response(500, json!("boom"))),
        url => Some(FetchOutcome::response(200, json!({"url": url}))),
    })
    .with_latency(Duration::ZERO)
}

fn by_url() -> Query<&'static str> {
    Query::new("by_url", get, Matchers::new().on_success())
}

#[tokio::test]
async fn round_trip_preserves_successful_entries() {
    let fetch = fetch();
    let api = Api::builder()
        .fetcher(fetch.clone())
        .grouper(StatusGroups)
        .build();
    for url in ["/b", "/bad", "/a"] {
        let _ = api.query(&by_url(), url).await;
    }
    assert_eq!(api.cache().len(), 3);

    let encoded = serde_json::to_string(&api.cache().serialize()).unwrap();
    let decoded: Snapshot = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded.len(), 2);

    let restored = QueryCache::from_snapshot(decoded, Arc::new(SystemClock));
    assert_eq!(
        restored.keys(),
        vec![CacheKey::new("/b"), CacheKey::new("/a")]
    );
    let original = api.cache().peek(&CacheKey::new("/a")).unwrap();
    let copy = restored.peek(&CacheKey::new("/a")).unwrap();
    assert_eq!(copy.response(), original.response());
    assert_eq!(copy.requested_at(), original.requested_at());
    assert_eq!(copy.request(), original.request());
    assert_eq!(copy.name(), "by_url");
}

#[tokio::test]
async fn snapshot_format_is_stable() {
    let clock = ManualClock::new("2024-05-01T12:00:00Z".parse().unwrap());
    let api = Api::builder()
        .fetcher(fetch())
        .grouper(StatusGroups)
        .clock(Arc::new(clock))
        .build();
    api.query(&by_url(), "/a").await.unwrap();

    let value = serde_json::to_value(api.cache().serialize()).unwrap();
    assert_eq!(
        value,
        json!({
            "/a": {
                "name": "by_url",
                "response": {"group": "success", "value": {"url": "/a"}},
                "request": {"method": "get", "url": "/a", "json": null, "meta": null, "ttl": null},
                "requestedAt": "2024-05-01T12:00:00Z",
                "loadingDur": "0s",
                "lastAccess": "0s"
            }
        })
    );
}

#[tokio::test]
async fn restored_entries_are_served_without_fetching() {
    let fetch = fetch();
    let first = Api::builder()
        .fetcher(fetch.clone())
        .grouper(StatusGroups)
        .build();
    first.query(&by_url(), "/a").await.unwrap();

    let second = Api::builder()
        .fetcher(fetch.clone())
        .grouper(StatusGroups)
        .build();
    second.cache().deserialize(first.cache().serialize());
    let value = second.query(&by_url(), "/a").await.unwrap();

    assert_eq!(value, group(SUCCESS, json!({"url": "/a"})));
    assert_eq!(fetch.calls(), 1);
}

#[test]
fn stale_snapshot_loads_verbatim() {
    let snapshot: Snapshot = serde_json::from_value(json!({
        "/old": {
            "name": "by_url",
            "response": {"group": "success", "value": 1},
            "request": {"method": "get", "url": "/old", "json": null},
            "requestedAt": "2001-01-01T00:00:00Z",
            "loadingDur": "15ms",
            "lastAccess": "15ms"
        }
    }))
    .unwrap();

    let cache = QueryCache::new();
    cache.deserialize(snapshot);
    let item = cache.peek(&CacheKey::new("/old")).unwrap();
    assert_eq!(item.loading_dur(), Duration::from_millis(15));
    assert!(
        cache
            .lookup(&CacheKey::new("/old"), Duration::from_secs(60))
            .fresh()
            .is_none()
    );
}
