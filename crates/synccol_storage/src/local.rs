//! Key/value storage adapter over a [`KeyValueArea`].

use crate::adapter::{counter_key, decode_value, encode_value, StorageAdapter};
use crate::area::KeyValueArea;
use crate::error::StorageResult;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// A storage adapter writing namespaced keys into a bounded key/value area.
///
/// Every key is stored as `<namespace>_<key>`. The area is synchronous; the
/// adapter wraps each call in an already-completed future.
///
/// The area is limited in size (5 MiB by default), so this adapter suits
/// small collections only.
///
/// # Example
///
/// ```rust
/// use synccol_storage::{LocalStorage, StorageAdapter};
/// use serde_json::json;
///
/// # futures::executor::block_on(async {
/// let store = LocalStorage::in_memory("app");
/// store.set("users", json!([{"id": 1}]), Some(3)).await.unwrap();
/// assert_eq!(store.get("users").await.unwrap(), Some(json!([{"id": 1}])));
/// assert_eq!(store.get("counter_users").await.unwrap(), Some(json!(3)));
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct LocalStorage {
    prefix: String,
    area: Arc<KeyValueArea>,
}

impl LocalStorage {
    /// Creates an adapter over a shared area.
    pub fn new(namespace: impl Into<String>, area: Arc<KeyValueArea>) -> Self {
        Self {
            prefix: namespace.into(),
            area,
        }
    }

    /// Creates an adapter over a fresh in-memory area.
    pub fn in_memory(namespace: impl Into<String>) -> Self {
        Self::new(namespace, Arc::new(KeyValueArea::new()))
    }

    /// Returns the underlying area.
    #[must_use]
    pub fn area(&self) -> &Arc<KeyValueArea> {
        &self.area
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}_{}", self.prefix, key)
    }
}

#[async_trait]
impl StorageAdapter for LocalStorage {
    fn name(&self) -> &str {
        &self.prefix
    }

    async fn reset(&self) -> StorageResult<()> {
        let removed = self.area.remove_prefix(&format!("{}_", self.prefix))?;
        debug!(namespace = %self.prefix, removed, "local storage reset");
        Ok(())
    }

    async fn set(&self, key: &str, value: Value, counter: Option<u64>) -> StorageResult<Value> {
        let mut items = vec![(self.full_key(key), encode_value(&value)?)];
        if let Some(counter) = counter {
            items.push((self.full_key(&counter_key(key)), counter.to_string()));
        }
        self.area.set_items(items)?;
        Ok(value)
    }

    async fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        Ok(self
            .area
            .get_item(&self.full_key(key))
            .filter(|raw| !raw.is_empty())
            .map(decode_value))
    }
}
