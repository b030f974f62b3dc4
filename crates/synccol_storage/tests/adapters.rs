//! Behavior every storage adapter must share.

use serde_json::{json, Value};
use synccol_storage::{DocumentStore, LocalStorage, StorageAdapter};

fn adapters() -> Vec<Box<dyn StorageAdapter>> {
    vec![
        Box::new(LocalStorage::in_memory("shared")),
        Box::new(DocumentStore::in_memory("shared")),
    ]
}

async fn stored(store: &dyn StorageAdapter, value: Value) -> Option<Value> {
    store.set("k", value, None).await.unwrap();
    store.get("k").await.unwrap()
}

#[tokio::test]
async fn structured_values_read_back_unchanged() {
    for store in adapters() {
        for value in [
            json!([{"id": 1, "name": "ada"}]),
            json!({"nested": {"list": [1, 2.5, null]}}),
            json!(42),
            json!(true),
        ] {
            assert_eq!(
                stored(store.as_ref(), value.clone()).await,
                Some(value),
                "adapter {}",
                store.name()
            );
        }
    }
}

#[tokio::test]
async fn json_text_strings_read_back_decoded() {
    for store in adapters() {
        assert_eq!(
            stored(store.as_ref(), json!("[]")).await,
            Some(json!([])),
            "adapter {}",
            store.name()
        );
        assert_eq!(
            stored(store.as_ref(), json!("{\"a\":1}")).await,
            Some(json!({"a": 1})),
            "adapter {}",
            store.name()
        );
    }
}

#[tokio::test]
async fn plain_strings_read_back_as_strings() {
    for store in adapters() {
        assert_eq!(
            stored(store.as_ref(), json!("hello")).await,
            Some(json!("hello")),
            "adapter {}",
            store.name()
        );
    }
}

#[tokio::test]
async fn counters_and_reset_behave_alike() {
    for store in adapters() {
        let returned = store.set("users", json!([1]), Some(4)).await.unwrap();
        assert_eq!(returned, json!([1]));
        assert_eq!(store.get("counter_users").await.unwrap(), Some(json!(4)));

        store.reset().await.unwrap();
        assert_eq!(store.get("users").await.unwrap(), None);
        assert_eq!(store.get("counter_users").await.unwrap(), None);
        store.reset().await.unwrap();
    }
}
