use std::sync::Arc;
use std::time::Duration;

use restbox::prelude::*;
use restbox::{ConfigError, DEFAULT_TTL};
use restbox_test::{FakeFetch, ManualClock};
use serde_json::json;

#[test]
fn test_yaml_config_deserialize() {
    let yaml = r#"
default_ttl: 10m 30s
"#;

    let config: ApiConfig = serde_saphyr::from_str(yaml).expect("failed to deserialize");
    assert_eq!(config.default_ttl, Some(Duration::from_secs(630)));
}

#[test]
fn test_empty_yaml_config_uses_builtin_ttl() {
    let config: ApiConfig = serde_saphyr::from_str("{}").expect("failed to deserialize");
    assert_eq!(config.default_ttl, None);
    assert_eq!(config.ttl_for(&get("/a")), DEFAULT_TTL);
}

#[test]
fn test_yaml_config_rejects_unknown_fields() {
    let yaml = r#"
default_ttl: 1m
max_entries: 10
"#;

    assert!(serde_saphyr::from_str::<ApiConfig>(yaml).is_err());
}

#[test]
fn test_yaml_round_trip() {
    let config = ApiConfig::with_default_ttl(Duration::from_secs(90));
    let yaml = serde_saphyr::to_string(&config).expect("failed to serialize");
    let decoded: ApiConfig = serde_saphyr::from_str(&yaml).expect("failed to deserialize");
    assert_eq!(decoded, config);
}

#[test]
fn test_invalid_duration_is_reported() {
    let err = ApiConfig::from_value(json!({"default_ttl": "soon"})).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
    assert!(err.to_string().starts_with("invalid api configuration"));
}

#[tokio::test]
async fn test_engine_uses_yaml_ttl() {
    let config: ApiConfig = serde_saphyr::from_str("default_ttl: 5s").expect("failed to deserialize");
    let clock = ManualClock::starting_now();
    let fetch = FakeFetch::new(|_| Some(FetchOutcome::response(200, json!(1))))
        .with_latency(Duration::ZERO);
    let api = Api::builder()
        .fetcher(fetch.clone())
        .grouper(StatusGroups)
        .clock(Arc::new(clock.clone()))
        .config(config)
        .build();
    let ping = Query::new("ping", |_: ()| get("/ping"), Matchers::new().on_success());

    api.query(&ping, ()).await.unwrap();
    clock.advance(Duration::from_millis(4999));
    api.query(&ping, ()).await.unwrap();
    assert_eq!(fetch.calls(), 1);

    clock.advance(Duration::from_millis(1));
    api.query(&ping, ()).await.unwrap();
    assert_eq!(fetch.calls(), 2);
}
