//! Integration tests for the sync engine against in-process servers.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use synccol_engine::{
    BaseModel, HttpClient, ManualConnectivity, MockRemote, Model, RequestOptions, RetryConfig,
    SyncConfig, SyncEngine,
};
use synccol_storage::{DocumentStore, LocalStorage, StorageAdapter, StoreKind};

/// A server that bumps a collection's counter on every write.
#[derive(Default)]
struct VersionedServer {
    collections: Mutex<HashMap<String, (u64, Vec<Value>)>>,
}

impl VersionedServer {
    fn publish(&self, name: &str, records: Vec<Value>) {
        let mut collections = self.collections.lock();
        let entry = collections.entry(name.to_string()).or_default();
        entry.0 += 1;
        entry.1 = records;
    }
}

#[async_trait]
impl HttpClient for VersionedServer {
    async fn get(&self, url: &str, _options: RequestOptions) -> Result<Vec<u8>, String> {
        let path = url.trim_start_matches("http://server.test/");
        let collections = self.collections.lock();
        let body = match path.strip_prefix("counter/") {
            Some(name) => {
                let counter = collections.get(name).map(|(c, _)| *c).unwrap_or(0);
                json!({ "counter": counter })
            }
            None => match collections.get(path) {
                Some((_, records)) => Value::Array(records.clone()),
                None => return Err(format!("HTTP 404: {path}")),
            },
        };
        Ok(body.to_string().into_bytes())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Product {
    id: u32,
    name: String,
    #[serde(default)]
    price: f64,
}

impl Model for Product {}

fn config() -> SyncConfig {
    SyncConfig::new("http://server.test").with_name("it")
}

#[tokio::test]
async fn live_records_follow_server_updates() {
    let server = Arc::new(VersionedServer::default());
    server.publish("products", vec![json!({"id": 1, "name": "pen", "price": 1.5})]);

    let engine = SyncEngine::new(
        config(),
        Arc::new(LocalStorage::in_memory("it")),
        server.clone(),
    );
    let products = engine.init::<Product>("products").await.unwrap();
    assert_eq!(products.len(), 1);

    server.publish(
        "products",
        vec![
            json!({"id": 1, "name": "pen", "price": 1.5}),
            json!({"id": 2, "name": "ink"}),
        ],
    );
    engine.resync().await;

    assert_eq!(products.len(), 2);
    assert_eq!(products.get(1).unwrap().price, 0.0);
    assert!(products.ptr_eq(&engine.get::<Product>("products").unwrap()));
}

#[tokio::test]
async fn cached_collections_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let server = Arc::new(VersionedServer::default());
    server.publish("products", vec![json!({"id": 1, "name": "pen"})]);

    {
        let storage = Arc::new(DocumentStore::open(dir.path(), "it").unwrap());
        let engine = SyncEngine::new(config(), storage, server.clone());
        engine.init::<Product>("products").await.unwrap();
    }

    let remote = Arc::new(MockRemote::new());
    let probe = Arc::new(ManualConnectivity::new());
    probe.set_offline(true);
    let engine = SyncEngine::builder(config().with_data_dir(dir.path()))
        .http_client(remote.clone())
        .connectivity(probe)
        .build()
        .unwrap();
    assert_eq!(engine.config().store, StoreKind::DocumentDb);

    let products = engine.init::<Product>("products").await.unwrap();
    assert_eq!(products.get(0).unwrap().name, "pen");
    assert!(remote.requests().is_empty());
}

#[tokio::test]
async fn local_storage_persists_between_engines() {
    let dir = tempfile::tempdir().unwrap();
    let server = Arc::new(VersionedServer::default());
    server.publish("tags", vec![json!({"id": 1, "label": "new"})]);

    let config = config()
        .with_store(StoreKind::LocalStorage)
        .with_data_dir(dir.path());

    let first = SyncEngine::builder(config.clone())
        .http_client(server.clone())
        .build()
        .unwrap();
    first.init::<BaseModel>("tags").await.unwrap();

    let second = SyncEngine::builder(config)
        .http_client(server.clone())
        .build()
        .unwrap();
    assert_eq!(
        second.storage().get("counter_tags").await.unwrap(),
        Some(json!(1))
    );
    let tags = second.init::<BaseModel>("tags").await.unwrap();
    assert_eq!(tags.get(0).unwrap().get("label"), Some(&json!("new")));
}

#[tokio::test]
async fn many_collections_load_together() {
    let server = Arc::new(VersionedServer::default());
    let names = ["a", "b", "c", "d"];
    for (i, name) in names.iter().enumerate() {
        let records = (0..=i).map(|id| json!({"id": id})).collect();
        server.publish(name, records);
    }

    let engine = SyncEngine::new(
        config(),
        Arc::new(DocumentStore::in_memory("it")),
        server,
    );
    let handles: Vec<_> = names
        .iter()
        .map(|name| engine.init::<BaseModel>(name))
        .collect();
    assert!(engine.is_loading());

    engine.load(false).await;

    assert!(!engine.is_loading());
    for (i, name) in names.iter().enumerate() {
        assert_eq!(engine.get::<BaseModel>(name).unwrap().len(), i + 1);
    }
    for handle in handles {
        assert!(handle.peek().is_some());
    }
}

#[tokio::test(start_paused = true)]
async fn unreachable_server_degrades_to_empty_collections() {
    let remote = Arc::new(MockRemote::new());
    remote.set_unreachable(true);
    let storage: Arc<dyn StorageAdapter> = Arc::new(LocalStorage::in_memory("it"));

    let engine = SyncEngine::new(
        config().with_retry(RetryConfig::new(2)),
        storage.clone(),
        remote.clone(),
    );
    let records = engine.init::<BaseModel>("orders").await.unwrap();

    assert!(records.is_empty());
    assert_eq!(remote.counter_requests("orders"), 3);
    assert_eq!(storage.get("orders").await.unwrap(), Some(json!([])));
    assert_eq!(storage.get("counter_orders").await.unwrap(), Some(json!(0)));
}

#[tokio::test]
async fn reset_then_reinit_downloads_again() {
    let server = Arc::new(VersionedServer::default());
    server.publish("products", vec![json!({"id": 1, "name": "pen"})]);
    let engine = SyncEngine::new(
        config(),
        Arc::new(DocumentStore::in_memory("it")),
        server,
    );

    engine.init::<Product>("products").await.unwrap();
    engine.reset().await.unwrap();
    assert!(engine.registry().is_empty());

    let products = engine.init::<Product>("products").await.unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(engine.stats().collection_fetches, 2);
}
