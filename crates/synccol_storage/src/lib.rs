//! # synccol Storage
//!
//! Storage adapter trait and implementations for synccol.
//!
//! This crate provides the local persistence layer under the sync engine.
//! Adapters are **namespaced key/value stores** of JSON values: they do not
//! interpret collections, counters or records beyond storing them.
//!
//! ## Design Principles
//!
//! - Adapters are async (`get`, `set`, `reset`) and `Send + Sync`
//! - A collection and its counter are written together by one `set`
//! - Reads never fail on corrupt values; they degrade to the raw text
//! - `reset` only touches the adapter's own namespace
//!
//! ## Available Adapters
//!
//! - [`LocalStorage`] - bounded key/value area, in memory or file-backed
//! - [`DocumentStore`] - document database with revisions
//!
//! ## Example
//!
//! ```rust
//! use synccol_storage::{DocumentStore, StorageAdapter};
//! use serde_json::json;
//!
//! # futures::executor::block_on(async {
//! let store = DocumentStore::in_memory("cache");
//! store.set("users", json!([{"id": 1}]), Some(4)).await.unwrap();
//! assert_eq!(store.get("counter_users").await.unwrap(), Some(json!(4)));
//! # });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod adapter;
mod area;
mod document;
mod error;
mod local;

pub use adapter::{counter_key, StorageAdapter, StoreKind, COUNTER_PREFIX};
pub use area::KeyValueArea;
pub use document::{Document, DocumentDb, DocumentStore};
pub use error::{StorageError, StorageResult};
pub use local::LocalStorage;
