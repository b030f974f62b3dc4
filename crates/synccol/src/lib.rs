//! # SyncCollections
//!
//! Client-side collections kept in sync with a remote API.
//!
//! A collection is a named, ordered set of records served by a remote API.
//! Each collection carries a server-assigned counter; the client downloads
//! a collection only when its counter changed, persists it locally, and
//! serves the cached copy when the network is unavailable.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use synccol::{BaseCollection, Extension, SyncConfig, SyncEngine};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let client = Arc::new(synccol::MockRemote::new());
//! let config = SyncConfig::from_json(r#"{"apiUrl": "https://api.example.com"}"#)?;
//! let engine = SyncEngine::builder(config).http_client(client).build()?;
//!
//! let users = BaseCollection::new(engine.clone()).extend_and_persist(Extension::named("users"));
//! engine.load(false).await;
//!
//! for user in users.all()?.read().iter() {
//!     println!("{user}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Crates
//!
//! - `synccol_storage`: storage adapters (key/value area, document database)
//! - `synccol_engine`: counter protocol, registry and load coordination
//! - `synccol`: collection definitions, queries and filtering

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod collection;
mod filtered;

pub use collection::{BaseCollection, Extension, Query, DEFAULT_NAME};
pub use filtered::{FilteredCollection, DEFAULT_FILTERED_NAME};

pub use synccol_engine::{
    completed_unit, open_store, AlwaysOnline, BaseModel, Checkable, CollectionRegistry,
    ConnectionType, Connectivity, HttpClient, InitHandle, JoinUnit, LoadCoordinator,
    ManualConnectivity, MockRemote, Model, Records, RequestOptions, RetryConfig, SyncConfig,
    SyncEngine, SyncEngineBuilder, SyncError, SyncResult, SyncStats,
};
pub use synccol_storage::{
    DocumentDb, DocumentStore, KeyValueArea, LocalStorage, StorageAdapter, StorageError,
    StorageResult, StoreKind,
};

#[cfg(feature = "reqwest-client")]
pub use synccol_engine::ReqwestClient;
