//! # SyncCollections Sync Engine
//!
//! Counter-based syncing of named collections from a remote API into local
//! storage.
//!
//! This crate provides:
//! - The per-collection counter protocol (local counter → remote counter →
//!   download only on mismatch → rebuild from local storage)
//! - Retry with a fixed delay, then graceful fallback to the cached copy
//! - A registry of live, typed record sequences
//! - A load coordinator joining every pending initialization
//! - HTTP client and connectivity abstractions
//!
//! ## Key Invariants
//!
//! - The server is authoritative; local data is a cache
//! - A collection is downloaded only when its counter changed
//! - A payload and its counter are persisted together
//! - Network failures never reach the caller; cached data is served instead
//! - Records are replaced in place, so existing handles see new data

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod connectivity;
mod error;
mod http;
mod loader;
mod model;
mod records;
mod registry;
mod state;
mod transport;

pub use config::{open_store, RetryConfig, SyncConfig};
pub use connectivity::{AlwaysOnline, ConnectionType, Connectivity, ManualConnectivity};
pub use error::{SyncError, SyncResult};
pub use http::{HttpClient, RequestOptions};
pub use loader::{completed_unit, JoinUnit, LoadCoordinator};
pub use model::{BaseModel, Checkable, Model};
pub use records::Records;
pub use registry::CollectionRegistry;
pub use state::{InitHandle, SyncEngine, SyncEngineBuilder, SyncStats, SyncStep};
pub use transport::{MockRemote, RemoteApi, RemoteCounter, RequestKind};

#[cfg(feature = "reqwest-client")]
pub use http::ReqwestClient;
