use entity_registry::application::provider::RegistryProvider;
use entity_registry::application::validator::Validator;
use entity_registry::config::CacheConfig;
use entity_registry::domain::context::Context;
use entity_registry::domain::entity::Entity;
use entity_registry::domain::ports::{CacheBackend, KeyValueStore};
use entity_registry::error::{RegistryError, ValidationError};
use entity_registry::infrastructure::in_memory::InMemoryKeyValueStore;
use entity_registry::infrastructure::remote::RemoteCache;
use std::sync::{Arc, Mutex};

mod common;
use common::{FailingCache, FailingPersistence, RecordingObserver, currency};

#[tokio::test]
async fn test_persistence_failure_aborts_remaining_steps() {
    let ctx = Context::background();
    let store = InMemoryKeyValueStore::new();
    let registry = RegistryProvider::new(Box::new(RemoteCache::new(
        Arc::new(store.clone()),
        &CacheConfig::default(),
    )))
    .with_persistence(Box::new(FailingPersistence));
    let log = Arc::new(Mutex::new(Vec::new()));
    registry
        .events()
        .subscribe(Arc::new(RecordingObserver::new("obs", log.clone())));

    let result = registry.register(&ctx, Entity::new("usd", "US Dollar")).await;

    assert!(matches!(result, Err(RegistryError::IoError(_))));
    assert!(store.get("registry:usd").await.unwrap().is_none());
    assert!(log.lock().unwrap().is_empty());
    assert_eq!(registry.count(&ctx).await.unwrap(), 0);

    let stats = registry.stats();
    assert_eq!(stats.registrations, 0);
    assert_eq!(stats.errors, 1);

    let health = registry.health_status();
    assert!(!health.healthy);
    assert!(health.last_error.unwrap().contains("disk full"));
}

#[tokio::test]
async fn test_cache_failure_leaves_entity_registered_without_event() {
    let ctx = Context::background();
    let registry = RegistryProvider::new(Box::new(FailingCache));
    let log = Arc::new(Mutex::new(Vec::new()));
    registry
        .events()
        .subscribe(Arc::new(RecordingObserver::new("obs", log.clone())));

    let result = registry.register(&ctx, Entity::new("usd", "US Dollar")).await;

    assert!(matches!(result, Err(RegistryError::Backend(_))));
    // The index was committed before the cache write; nothing is rolled back.
    assert_eq!(registry.count(&ctx).await.unwrap(), 1);
    assert!(log.lock().unwrap().is_empty());
    assert!(!registry.health().is_healthy());

    registry.health().clear_error();
    assert!(registry.health().is_healthy());
}

#[tokio::test]
async fn test_validator_precedence_through_provider() {
    let ctx = Context::background();
    let registry = RegistryProvider::new(Box::new(FailingCache)).with_validator(
        Validator::new()
            .with_required_metadata(["symbol"])
            .with_field_validator("decimals", |v| {
                if v.chars().all(|c| c.is_ascii_digit()) {
                    Ok(())
                } else {
                    Err("must be numeric".to_string())
                }
            }),
    );

    let entity = Entity::new("usd", "US Dollar")
        .with_metadata("decimals", "two")
        .unwrap();
    let err = registry.register(&ctx, entity).await.unwrap_err();
    assert!(matches!(
        err,
        RegistryError::Validation(ValidationError::MissingMetadata(ref key)) if key == "symbol"
    ));

    let entity = currency("usd", "US Dollar", "$")
        .with_metadata("decimals", "two")
        .unwrap();
    let err = registry.register(&ctx, entity).await.unwrap_err();
    match err {
        RegistryError::Validation(v) => assert_eq!(v.field(), "decimals"),
        other => panic!("unexpected error: {other}"),
    }

    // Validation errors never touch health.
    assert!(registry.health().is_healthy());
}

#[tokio::test]
async fn test_write_through_to_remote_cache() {
    let ctx = Context::background();
    let store = InMemoryKeyValueStore::new();
    let cache = RemoteCache::new(
        Arc::new(store.clone()),
        &CacheConfig::default().with_key_prefix("currencies:"),
    );
    let registry = RegistryProvider::new(Box::new(cache));

    registry.register(&ctx, currency("usd", "US Dollar", "$")).await.unwrap();
    registry.register(&ctx, currency("eur", "Euro", "€")).await.unwrap();

    let probe = RemoteCache::new(
        Arc::new(store.clone()),
        &CacheConfig::default().with_key_prefix("currencies:"),
    );
    assert_eq!(probe.size(&ctx).await.unwrap(), 2);

    registry.unregister(&ctx, "usd").await.unwrap();
    assert_eq!(probe.size(&ctx).await.unwrap(), 1);
    assert!(probe.get(&ctx, "usd").await.unwrap().is_none());
}
