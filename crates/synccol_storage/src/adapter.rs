//! Storage adapter trait definition.

use crate::error::StorageResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Prefix of the key under which a collection's counter is stored.
pub const COUNTER_PREFIX: &str = "counter_";

/// Returns the key under which the counter for `key` is stored.
pub fn counter_key(key: &str) -> String {
    format!("{COUNTER_PREFIX}{key}")
}

/// An async key/value store for cached collections and their counters.
///
/// Adapters are namespaced: every key an adapter writes lives under its own
/// namespace, and [`reset`](StorageAdapter::reset) only removes those keys.
///
/// # Invariants
///
/// - `set(key, v, _)` followed by `get(key)` yields a value equal to `v`,
///   except that a string holding JSON text reads back as that JSON
///   (`json!("[]")` reads back as `json!([])`)
/// - `set(key, v, Some(c))` also stores `c` under [`counter_key`]`(key)`
/// - `get` never fails because of a corrupt value; a string that is not
///   JSON is returned as-is
/// - `reset` on an empty store succeeds
///
/// # Implementors
///
/// - [`super::LocalStorage`] - bounded key/value area
/// - [`super::DocumentStore`] - document database with revisions
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Returns the namespace of this adapter.
    fn name(&self) -> &str;

    /// Deletes every key stored under this adapter's namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the deletion cannot be made durable.
    async fn reset(&self) -> StorageResult<()>;

    /// Stores `value` under `key`, and `counter` under `counter_<key>` when
    /// one is given. Returns the original value.
    ///
    /// String values are stored as-is; everything else is stored as JSON.
    /// Either way `get` decodes what it finds.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be encoded or the write fails.
    async fn set(&self, key: &str, value: Value, counter: Option<u64>) -> StorageResult<Value>;

    /// Reads the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the underlying store cannot be read.
    async fn get(&self, key: &str) -> StorageResult<Option<Value>>;
}

/// Encodes a value to its stored text form.
///
/// Strings are stored raw, the way a host would hand over pre-serialized
/// payloads.
pub(crate) fn encode_value(value: &Value) -> StorageResult<String> {
    match value {
        Value::String(raw) => Ok(raw.clone()),
        other => Ok(serde_json::to_string(other)?),
    }
}

/// Decodes stored text, falling back to the raw string when it is not JSON.
pub(crate) fn decode_value(raw: String) -> Value {
    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(_) => Value::String(raw),
    }
}

/// Selects which storage adapter a host uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StoreKind {
    /// [`super::LocalStorage`].
    #[serde(alias = "localStorage", alias = "local-storage")]
    LocalStorage,
    /// [`super::DocumentStore`].
    #[default]
    #[serde(alias = "PouchDBStorage", alias = "documentDb", alias = "document-db")]
    DocumentDb,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::LocalStorage => f.write_str("local-storage"),
            StoreKind::DocumentDb => f.write_str("document-db"),
        }
    }
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local-storage" | "local" | "LocalStorage" => Ok(StoreKind::LocalStorage),
            "document-db" | "document" | "DocumentDb" | "PouchDBStorage" => {
                Ok(StoreKind::DocumentDb)
            }
            other => Err(format!("unknown store kind: {other}")),
        }
    }
}
