//! Configuration for the sync engine.

use crate::error::{SyncError, SyncResult};
use rand::Rng;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use synccol_storage::{DocumentStore, KeyValueArea, LocalStorage, StorageAdapter, StoreKind};

/// File name of the key/value snapshot inside `data_dir`.
const LOCAL_STORAGE_FILE: &str = "local-storage.json";

/// Process-wide configuration for collection syncing.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the remote API (no trailing slash needed).
    pub api_url: String,
    /// Retry configuration for counter requests.
    pub retry: RetryConfig,
    /// Base request timeout; each call scales it (see
    /// [`RequestKind`](crate::RequestKind)).
    pub request_timeout: Duration,
    /// Which storage adapter to open.
    pub store: StoreKind,
    /// Whether requests carry credentials.
    pub with_credentials: bool,
    /// Storage namespace.
    pub name: String,
    /// Directory for persistent stores; in-memory when unset.
    pub data_dir: Option<PathBuf>,
}

impl SyncConfig {
    /// Creates a configuration for the given API with default values.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            retry: RetryConfig::default(),
            request_timeout: Duration::from_millis(5000),
            store: StoreKind::default(),
            with_credentials: false,
            name: random_namespace(),
            data_dir: None,
        }
    }

    /// Parses a JSON configuration object.
    ///
    /// Recognized keys: `apiUrl`, `retryCount`, `retryDelay` (ms),
    /// `requestTimeout` (ms), `store`, `withCredentials`, `name`, `dataDir`.
    /// Missing keys keep their defaults; unknown keys are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] if the JSON is invalid.
    pub fn from_json(json: &str) -> SyncResult<Self> {
        let raw: RawConfig =
            serde_json::from_str(json).map_err(|e| SyncError::Config(e.to_string()))?;

        let mut config = Self::default();
        if let Some(api_url) = raw.api_url {
            config.api_url = api_url;
        }
        if let Some(count) = raw.retry_count {
            config.retry.max_retries = count;
        }
        if let Some(delay) = raw.retry_delay {
            config.retry.delay = Duration::from_millis(delay);
        }
        if let Some(timeout) = raw.request_timeout {
            config.request_timeout = Duration::from_millis(timeout);
        }
        if let Some(store) = raw.store {
            config.store = store;
        }
        if let Some(with_credentials) = raw.with_credentials {
            config.with_credentials = with_credentials;
        }
        if let Some(name) = raw.name {
            config.name = name;
        }
        config.data_dir = raw.data_dir;
        Ok(config)
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the base request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the storage adapter kind.
    pub fn with_store(mut self, store: StoreKind) -> Self {
        self.store = store;
        self
    }

    /// Sets whether requests carry credentials.
    pub fn with_credentials(mut self, with_credentials: bool) -> Self {
        self.with_credentials = with_credentials;
        self
    }

    /// Sets the storage namespace.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the directory for persistent stores.
    pub fn with_data_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.data_dir = Some(dir.as_ref().to_path_buf());
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new("")
    }
}

/// Counter request retry behavior.
///
/// A failed counter request is retried up to `max_retries` times with a
/// fixed delay, so a collection makes at most `max_retries + 1` attempts
/// before falling back to its cached copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Delay before each retry.
    pub delay: Duration,
}

impl RetryConfig {
    /// Creates a retry configuration with the default delay.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            delay: Duration::from_millis(500),
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            delay: Duration::ZERO,
        }
    }

    /// Sets the delay between retries.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Returns the delay before the given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            Duration::ZERO
        } else {
            self.delay
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawConfig {
    api_url: Option<String>,
    retry_count: Option<u32>,
    retry_delay: Option<u64>,
    request_timeout: Option<u64>,
    store: Option<StoreKind>,
    with_credentials: Option<bool>,
    name: Option<String>,
    data_dir: Option<PathBuf>,
}

/// Opens the storage adapter selected by the configuration.
///
/// Stores live under `data_dir` when it is set and in memory otherwise.
///
/// # Errors
///
/// Returns an error if a persistent store cannot be opened.
pub fn open_store(config: &SyncConfig) -> SyncResult<Arc<dyn StorageAdapter>> {
    let store: Arc<dyn StorageAdapter> = match (config.store, &config.data_dir) {
        (StoreKind::LocalStorage, Some(dir)) => {
            let area = KeyValueArea::open(&dir.join(LOCAL_STORAGE_FILE))?;
            Arc::new(LocalStorage::new(config.name.clone(), Arc::new(area)))
        }
        (StoreKind::LocalStorage, None) => Arc::new(LocalStorage::in_memory(config.name.clone())),
        (StoreKind::DocumentDb, Some(dir)) => {
            Arc::new(DocumentStore::open(dir, config.name.clone())?)
        }
        (StoreKind::DocumentDb, None) => Arc::new(DocumentStore::in_memory(config.name.clone())),
    };
    Ok(store)
}

fn random_namespace() -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..10_000_000);
    format!("syncCollections-{suffix}")
}
