//! Sync engine and the per-collection counter protocol.

use crate::config::{open_store, SyncConfig};
use crate::connectivity::{AlwaysOnline, Connectivity};
use crate::error::{SyncError, SyncResult};
use crate::http::HttpClient;
use crate::loader::{completed_unit, JoinUnit, LoadCoordinator};
use crate::model::Model;
use crate::records::Records;
use crate::registry::{CollectionRegistry, CollectionSlot, TypedSlot};
use crate::transport::{RemoteApi, RequestKind};
use futures::future::{self, BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use std::any::type_name;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use synccol_storage::{counter_key, StorageAdapter};
use tracing::{debug, info, warn};

/// The steps of the per-collection sync protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStep {
    /// Reading the persisted counter.
    FetchLocalCounter,
    /// Comparing against the remote counter.
    CompareRemote,
    /// Downloading the full collection.
    FetchRemote,
    /// Rebuilding records from the persisted copy.
    UseLocal,
}

/// Statistics about sync operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Counter requests made, retries included.
    pub counter_requests: u64,
    /// Collections downloaded and persisted.
    pub collection_fetches: u64,
    /// Collection downloads that failed.
    pub fetch_failures: u64,
    /// Counter requests retried.
    pub retries: u64,
    /// Syncs that gave up on the network and served the cached copy.
    pub offline_fallbacks: u64,
    /// Syncs where the local counter matched the remote one.
    pub cache_hits: u64,
    /// Last network error message.
    pub last_error: Option<String>,
}

/// A pending collection initialization.
///
/// Every clone awaits the same run; the result is the collection's live
/// records.
pub type InitHandle<M> = Shared<BoxFuture<'static, SyncResult<Records<M>>>>;

struct EngineInner {
    config: SyncConfig,
    storage: Arc<dyn StorageAdapter>,
    remote: RemoteApi,
    connectivity: Arc<dyn Connectivity>,
    registry: Arc<CollectionRegistry>,
    loader: LoadCoordinator,
    resync: Mutex<Option<JoinUnit>>,
    stats: RwLock<SyncStats>,
}

/// Keeps named collections in sync with a remote API.
///
/// Each collection carries a server-assigned counter. A sync compares the
/// persisted counter with the remote one and downloads the collection only
/// when they differ; otherwise, or when the network is unavailable, the
/// records are rebuilt from local storage. Network failures never reach the
/// caller.
///
/// The engine is a cheap handle: clones share one registry, one load
/// coordinator and one storage adapter.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

impl SyncEngine {
    /// Creates an engine over the given storage and HTTP client.
    pub fn new(
        config: SyncConfig,
        storage: Arc<dyn StorageAdapter>,
        client: Arc<dyn HttpClient>,
    ) -> Self {
        Self::from_parts(
            config,
            storage,
            client,
            Arc::new(AlwaysOnline),
            Arc::new(CollectionRegistry::new()),
        )
    }

    /// Starts building an engine.
    pub fn builder(config: SyncConfig) -> SyncEngineBuilder {
        SyncEngineBuilder::new(config)
    }

    fn from_parts(
        config: SyncConfig,
        storage: Arc<dyn StorageAdapter>,
        client: Arc<dyn HttpClient>,
        connectivity: Arc<dyn Connectivity>,
        registry: Arc<CollectionRegistry>,
    ) -> Self {
        let remote = RemoteApi::new(&config, client);
        let loader = LoadCoordinator::new();
        loader.init();
        Self {
            inner: Arc::new(EngineInner {
                config,
                storage,
                remote,
                connectivity,
                registry,
                loader,
                resync: Mutex::new(None),
                stats: RwLock::new(SyncStats::default()),
            }),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// Returns the storage adapter.
    pub fn storage(&self) -> &Arc<dyn StorageAdapter> {
        &self.inner.storage
    }

    /// Returns the collection registry.
    pub fn registry(&self) -> &Arc<CollectionRegistry> {
        &self.inner.registry
    }

    /// Returns a snapshot of the sync statistics.
    pub fn stats(&self) -> SyncStats {
        self.inner.stats.read().clone()
    }

    /// Returns true while collection initializations are pending.
    pub fn is_loading(&self) -> bool {
        self.inner.loader.is_loading()
    }

    /// Starts syncing a collection with model type `M`.
    ///
    /// The returned handle is also registered with the load coordinator,
    /// so [`load`](Self::load) waits for it. The run starts once any holder
    /// awaits it.
    ///
    /// The only error is [`SyncError::ModelMismatch`], when `name` is
    /// already registered with another model type.
    pub fn init<M: Model>(&self, name: &str) -> InitHandle<M> {
        let weak = Arc::downgrade(&self.inner);
        let name = name.to_string();

        let handle = async move {
            let engine = upgrade(&weak).ok_or_else(|| SyncError::NotFound { name: name.clone() })?;

            if let Some(registered) = engine.inner.registry.model_type(&name) {
                if registered != type_name::<M>() {
                    return Err(SyncError::ModelMismatch {
                        name,
                        registered,
                        requested: type_name::<M>(),
                    });
                }
            }

            let slot: Arc<dyn CollectionSlot> = Arc::new(TypedSlot::<M>::new(name.clone()));
            engine.check_counter_and_load(slot).await;
            engine.inner.registry.records::<M>(&name)
        }
        .boxed()
        .shared();

        self.inner
            .loader
            .add_pending(handle.clone().map(|_| ()).boxed().shared());
        handle
    }

    /// Returns the live records of an initialized collection.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] if the collection was never
    /// initialized and [`SyncError::ModelMismatch`] if it holds another
    /// model type.
    pub fn get<M: Model>(&self, name: &str) -> SyncResult<Records<M>> {
        self.inner.registry.records(name)
    }

    /// Re-runs the sync protocol for every registered collection.
    ///
    /// While a resync is in flight, further calls return the same unit.
    pub fn resync(&self) -> JoinUnit {
        let mut current = self.inner.resync.lock();
        if let Some(unit) = current.as_ref() {
            if unit.peek().is_none() {
                return unit.clone();
            }
        }

        let weak = Arc::downgrade(&self.inner);
        let unit = async move {
            let Some(engine) = upgrade(&weak) else {
                return;
            };
            let slots = engine.inner.registry.entries();
            info!(collections = slots.len(), "resyncing collections");

            future::join_all(
                slots
                    .into_iter()
                    .map(|slot| engine.check_counter_and_load(slot)),
            )
            .await;

            *engine.inner.resync.lock() = None;
            debug!("resync finished");
        }
        .boxed()
        .shared();

        *current = Some(unit.clone());
        unit
    }

    /// Returns a unit that settles when collections are loaded.
    ///
    /// Pending initializations take precedence; otherwise `resync` decides
    /// between a fresh resync and an already completed unit.
    pub fn load(&self, resync: bool) -> JoinUnit {
        if self.inner.loader.is_loading() {
            self.inner.loader.load()
        } else if resync {
            self.resync()
        } else {
            completed_unit()
        }
    }

    /// Forgets every collection and wipes local storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage adapter cannot be reset.
    pub async fn reset(&self) -> SyncResult<()> {
        info!(store = self.inner.storage.name(), "resetting collections");
        self.inner.registry.clear();
        self.inner.storage.reset().await?;
        Ok(())
    }

    /// Returns true if the persisted counter of `name` matches the remote
    /// one. Nothing is downloaded or written.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Offline`] when the device is offline, or the
    /// error of the counter request.
    pub async fn check_counter(&self, name: &str) -> SyncResult<bool> {
        if self.inner.connectivity.is_offline() {
            return Err(SyncError::Offline);
        }
        let local = self.local_counter(name).await;
        self.record(|stats| stats.counter_requests += 1);
        let remote = self
            .inner
            .remote
            .counter(name, RequestKind::CounterCheck)
            .await?;
        Ok(local == remote)
    }

    /// Runs [`check_counter`](Self::check_counter) for every registered
    /// collection concurrently.
    ///
    /// # Errors
    ///
    /// Fails if any counter request fails.
    pub async fn check_counters(&self) -> SyncResult<BTreeMap<String, bool>> {
        let names = self.inner.registry.names();
        let results =
            future::try_join_all(names.iter().map(|name| self.check_counter(name))).await?;
        Ok(names.into_iter().zip(results).collect())
    }

    async fn check_counter_and_load(&self, slot: Arc<dyn CollectionSlot>) {
        let name = slot.name().to_string();

        debug!(collection = %name, step = ?SyncStep::FetchLocalCounter);
        let local = self.local_counter(&name).await;

        if self.inner.connectivity.is_offline() {
            warn!(collection = %name, "device is offline, using cached collection");
            self.record(|stats| stats.offline_fallbacks += 1);
        } else {
            self.compare_remote(&name, local).await;
        }

        self.local_collection(slot).await;
    }

    async fn compare_remote(&self, name: &str, local: u64) {
        let retry = &self.inner.config.retry;
        let mut attempt = 0;

        loop {
            debug!(collection = %name, step = ?SyncStep::CompareRemote, local, attempt);
            self.record(|stats| stats.counter_requests += 1);

            match self.inner.remote.counter(name, RequestKind::CounterSync).await {
                Ok(remote) if remote == local => {
                    debug!(collection = %name, counter = local, "collection is up to date");
                    self.record(|stats| stats.cache_hits += 1);
                    return;
                }
                Ok(remote) => {
                    self.fetch_collection(name, remote).await;
                    return;
                }
                Err(SyncError::Decode(reason)) => {
                    warn!(collection = %name, %reason, "unreadable counter, refetching collection");
                    self.fetch_collection(name, 0).await;
                    return;
                }
                Err(e) if e.is_retryable() && attempt < retry.max_retries => {
                    attempt += 1;
                    warn!(
                        collection = %name,
                        attempt,
                        max_retries = retry.max_retries,
                        error = %e,
                        "counter request failed, retrying"
                    );
                    self.record(|stats| stats.retries += 1);
                    tokio::time::sleep(retry.delay_for_attempt(attempt)).await;
                }
                Err(e) => {
                    warn!(
                        collection = %name,
                        error = %e,
                        "counter request failed, server may be offline; using cached collection"
                    );
                    self.record(|stats| {
                        stats.offline_fallbacks += 1;
                        stats.last_error = Some(e.to_string());
                    });
                    return;
                }
            }
        }
    }

    async fn fetch_collection(&self, name: &str, counter: u64) {
        debug!(collection = %name, step = ?SyncStep::FetchRemote, counter);
        let storage = &self.inner.storage;

        match self.inner.remote.collection(name).await {
            Ok(payload) => {
                self.record(|stats| stats.collection_fetches += 1);
                if let Err(e) = storage.set(name, payload, Some(counter)).await {
                    warn!(collection = %name, error = %e, "failed to persist collection");
                }
            }
            Err(e) => {
                warn!(collection = %name, error = %e, "collection download failed");
                self.record(|stats| {
                    stats.fetch_failures += 1;
                    stats.last_error = Some(e.to_string());
                });
                if let Err(e) = storage.set(&counter_key(name), json!(0), None).await {
                    warn!(collection = %name, error = %e, "failed to reset counter");
                }
            }
        }
    }

    async fn local_collection(&self, slot: Arc<dyn CollectionSlot>) {
        let name = slot.name().to_string();
        debug!(collection = %name, step = ?SyncStep::UseLocal);

        let payload = match self.inner.storage.get(&name).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!(collection = %name, error = %e, "failed to read cached collection");
                None
            }
        };

        let slot = self.inner.registry.get_or_insert(slot);
        match payload {
            Some(Value::Array(raw)) => {
                let total = raw.len();
                let kept = slot.rehydrate(raw);
                debug!(collection = %name, kept, total, "collection loaded");
            }
            other => {
                if other.is_some() {
                    warn!(collection = %name, "cached collection is not a list, discarding it");
                }
                slot.clear();
                if let Err(e) = self.inner.storage.set(&name, json!([]), Some(0)).await {
                    warn!(collection = %name, error = %e, "failed to persist empty collection");
                }
            }
        }
    }

    async fn local_counter(&self, name: &str) -> u64 {
        match self.inner.storage.get(&counter_key(name)).await {
            Ok(Some(value)) => parse_counter(&value),
            Ok(None) => 0,
            Err(e) => {
                warn!(collection = %name, error = %e, "failed to read counter");
                0
            }
        }
    }

    fn record(&self, f: impl FnOnce(&mut SyncStats)) {
        f(&mut *self.inner.stats.write());
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("api_url", &self.inner.config.api_url)
            .field("store", &self.inner.storage.name())
            .field("registry", &self.inner.registry)
            .field("loader", &self.inner.loader)
            .finish()
    }
}

fn upgrade(weak: &Weak<EngineInner>) -> Option<SyncEngine> {
    weak.upgrade().map(|inner| SyncEngine { inner })
}

/// Reads a persisted counter: a number, or a string starting with digits.
fn parse_counter(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Value::String(s) => {
            let digits: String = s
                .trim_start()
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            digits.parse().unwrap_or(0)
        }
        _ => 0,
    }
}

/// Builder for [`SyncEngine`].
pub struct SyncEngineBuilder {
    config: SyncConfig,
    storage: Option<Arc<dyn StorageAdapter>>,
    client: Option<Arc<dyn HttpClient>>,
    connectivity: Option<Arc<dyn Connectivity>>,
    registry: Option<Arc<CollectionRegistry>>,
}

impl SyncEngineBuilder {
    /// Creates a builder for the given configuration.
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            storage: None,
            client: None,
            connectivity: None,
            registry: None,
        }
    }

    /// Uses the given storage adapter instead of opening one from the
    /// configuration.
    pub fn storage(mut self, storage: Arc<dyn StorageAdapter>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Sets the HTTP client.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Sets the connectivity probe.
    pub fn connectivity(mut self, connectivity: Arc<dyn Connectivity>) -> Self {
        self.connectivity = Some(connectivity);
        self
    }

    /// Shares an existing registry.
    pub fn registry(mut self, registry: Arc<CollectionRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Builds the engine.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] if no HTTP client was set, or the error
    /// of opening the configured store.
    pub fn build(self) -> SyncResult<SyncEngine> {
        let client = self
            .client
            .ok_or_else(|| SyncError::Config("an HTTP client is required".into()))?;
        let storage = match self.storage {
            Some(storage) => storage,
            None => open_store(&self.config)?,
        };
        Ok(SyncEngine::from_parts(
            self.config,
            storage,
            client,
            self.connectivity.unwrap_or_else(|| Arc::new(AlwaysOnline)),
            self.registry.unwrap_or_default(),
        ))
    }
}
