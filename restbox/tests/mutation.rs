//! Mutations: never cached, never deduplicated, effect on a `success` response only.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use restbox::prelude::*;
use restbox_test::FakeFetch;
use serde_json::{Value, json};

fn backend() -> FakeFetch {
    FakeFetch::new(|req| match (req.method(), req.url()) {
        (restbox::Method::Get, "/users") => Some(FetchOutcome::response(200, json!(["ann"]))),
        (restbox::Method::Post, "/users") => {
            let name = req.json().cloned().unwrap_or(Value::Null);
            Some(FetchOutcome::response(201, json!({"created": name})))
        }
        (restbox::Method::Delete, "/users/1") => {
            Some(FetchOutcome::response(409, json!("still referenced")))
        }
        _ => None,
    })
    .with_latency(Duration::ZERO)
}

fn api(fetch: &FakeFetch) -> Api {
    Api::builder()
        .fetcher(fetch.clone())
        .grouper(StatusGroups)
        .build()
}

fn counting(counter: &Arc<AtomicUsize>) -> Mutation<&'static str> {
    let effects = counter.clone();
    Mutation::new(
        "create_user",
        |name: &'static str| post("/users", json!({"name": name})),
        Matchers::new().on_success().proxy_as("409", "conflict"),
    )
    .effect_on_success(move |_cache| {
        effects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
}

#[tokio::test]
async fn mutation_is_never_cached() {
    let fetch = backend();
    let api = api(&fetch);
    let effects = Arc::new(AtomicUsize::new(0));
    let create = counting(&effects);

    let first = api.mutate(&create, "ann").await.unwrap();
    api.mutate(&create, "ann").await.unwrap();

    assert_eq!(first, group(SUCCESS, json!({"created": {"name": "ann"}})));
    assert_eq!(fetch.calls(), 2);
    assert!(api.cache().is_empty());
    assert_eq!(effects.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn effect_runs_only_on_success() {
    let fetch = backend();
    let api = api(&fetch);
    let effects = Arc::new(AtomicUsize::new(0));
    let counter = effects.clone();
    let remove = Mutation::new(
        "remove_user",
        |id: u32| delete(format!("/users/{id}"), None::<Value>),
        Matchers::new().on_success().proxy_as("409", "conflict"),
    )
    .effect_on_success(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let conflict = api.mutate(&remove, 1).await.unwrap();
    assert_eq!(conflict, group("conflict", "still referenced"));
    assert_eq!(effects.load(Ordering::SeqCst), 0);

    let unknown = api.mutate(&remove, 2).await.unwrap_err();
    assert_eq!(unknown.kind(), restbox::FAILED);
    assert_eq!(effects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn effect_can_invalidate_queries() {
    let fetch = backend();
    let api = api(&fetch);
    let list = Query::new("users", |_: ()| get("/users"), Matchers::new().on_success());
    let create = Mutation::new(
        "create_user",
        |name: &'static str| post("/users", json!({"name": name})),
        Matchers::new().on_success(),
    )
    .effect_on_success(|cache| {
        cache.delete_by_name("users");
        Ok(())
    });

    api.query(&list, ()).await.unwrap();
    api.query(&list, ()).await.unwrap();
    assert_eq!(fetch.calls_for("/users"), 1);

    api.mutate(&create, "bob").await.unwrap();
    assert!(api.cache().is_empty());

    api.query(&list, ()).await.unwrap();
    let gets = fetch
        .requests()
        .iter()
        .filter(|req| req.method() == restbox::Method::Get)
        .count();
    assert_eq!(gets, 2);
}

#[tokio::test]
async fn failing_effect_keeps_the_result() {
    let fetch = backend();
    let api = api(&fetch);
    let create = Mutation::new(
        "create_user",
        |name: &'static str| post("/users", json!({"name": name})),
        Matchers::new().on_success(),
    )
    .effect_on_success(|_| Err("effect exploded".into()));

    let result = api.mutate(&create, "ann").await.unwrap();
    assert_eq!(result.tag(), SUCCESS);
}

#[tokio::test(start_paused = true)]
async fn concurrent_mutations_are_not_deduplicated() {
    let fetch = backend().with_latency(Duration::from_millis(30));
    let api = api(&fetch);
    let effects = Arc::new(AtomicUsize::new(0));
    let create = counting(&effects);

    let (a, b) = tokio::join!(api.mutate(&create, "ann"), api.mutate(&create, "ann"));
    assert!(a.is_ok() && b.is_ok());
    assert_eq!(fetch.calls(), 2);
    assert_eq!(fetch.peak_in_flight(), 2);
}

#[tokio::test]
async fn renamed_success_still_runs_the_effect() {
    let fetch = backend();
    let api = api(&fetch);
    let effects = Arc::new(AtomicUsize::new(0));
    let counter = effects.clone();
    let create = Mutation::new(
        "create_user",
        |name: &'static str| post("/users", json!({"name": name})),
        Matchers::new().proxy_as(SUCCESS, "created"),
    )
    .effect_on_success(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let created = api.mutate(&create, "ann").await.unwrap();
    assert_eq!(created.tag(), "created");
    assert_eq!(effects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failure_renamed_to_success_skips_the_effect() {
    let fetch = backend();
    let api = api(&fetch);
    let effects = Arc::new(AtomicUsize::new(0));
    let counter = effects.clone();
    let remove = Mutation::new(
        "remove_user",
        |id: u32| delete(format!("/users/{id}"), None::<Value>),
        Matchers::new().proxy_as("409", SUCCESS),
    )
    .effect_on_success(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let removed = api.mutate(&remove, 1).await.unwrap();
    assert_eq!(removed, group(SUCCESS, "still referenced"));
    assert_eq!(effects.load(Ordering::SeqCst), 0);
}
