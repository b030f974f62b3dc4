//! Remote API calls for counters and collections.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::http::{HttpClient, RequestOptions};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// The calls the engine makes, each with its own timeout budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Diagnostic counter comparison (1× the request timeout).
    CounterCheck,
    /// Counter request of a sync cycle (2×).
    CounterSync,
    /// Full collection fetch (5×).
    Collection,
}

impl RequestKind {
    /// Returns the multiplier applied to the base request timeout.
    pub fn timeout_factor(&self) -> u32 {
        match self {
            RequestKind::CounterCheck => 1,
            RequestKind::CounterSync => 2,
            RequestKind::Collection => 5,
        }
    }
}

/// Body of `GET <apiUrl>/counter/<name>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RemoteCounter {
    /// Current server counter of the collection.
    pub counter: u64,
}

/// Client for the remote counter and collection endpoints.
#[derive(Clone)]
pub struct RemoteApi {
    base_url: String,
    client: Arc<dyn HttpClient>,
    request_timeout: Duration,
    with_credentials: bool,
}

impl RemoteApi {
    /// Creates a remote API client from the configuration.
    pub fn new(config: &SyncConfig, client: Arc<dyn HttpClient>) -> Self {
        Self {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            client,
            request_timeout: config.request_timeout,
            with_credentials: config.with_credentials,
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the URL of a collection's counter.
    pub fn counter_url(&self, name: &str) -> String {
        format!("{}/counter/{}", self.base_url, name)
    }

    /// Returns the URL of a collection.
    pub fn collection_url(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name)
    }

    /// Returns the options used for a request of the given kind.
    pub fn options(&self, kind: RequestKind) -> RequestOptions {
        RequestOptions {
            timeout: self.request_timeout * kind.timeout_factor(),
            with_credentials: self.with_credentials,
        }
    }

    /// Fetches the remote counter of a collection.
    ///
    /// # Errors
    ///
    /// Returns a network, timeout or decode error.
    pub async fn counter(&self, name: &str, kind: RequestKind) -> SyncResult<u64> {
        let body: RemoteCounter = self.get_json(&self.counter_url(name), kind).await?;
        Ok(body.counter)
    }

    /// Fetches the full payload of a collection.
    ///
    /// # Errors
    ///
    /// Returns a network, timeout or decode error.
    pub async fn collection(&self, name: &str) -> SyncResult<Value> {
        self.get_json(&self.collection_url(name), RequestKind::Collection)
            .await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, kind: RequestKind) -> SyncResult<T> {
        let options = self.options(kind);
        debug!(url, ?kind, "remote request");

        let body = tokio::time::timeout(options.timeout, self.client.get(url, options))
            .await
            .map_err(|_| SyncError::Timeout)?
            .map_err(SyncError::network_retryable)?;

        serde_json::from_slice(&body)
            .map_err(|e| SyncError::Decode(format!("invalid response from {url}: {e}")))
    }
}

impl std::fmt::Debug for RemoteApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteApi")
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .field("with_credentials", &self.with_credentials)
            .finish()
    }
}

/// A scriptable in-process remote for testing.
///
/// Serves `/counter/<name>` and `/<name>` from in-memory tables, records
/// every request path, and can inject failures and latency.
#[derive(Debug, Default)]
pub struct MockRemote {
    state: Mutex<MockState>,
}

#[derive(Debug, Default)]
struct MockState {
    counters: HashMap<String, Value>,
    collections: HashMap<String, Value>,
    counter_failures: HashMap<String, u32>,
    failing_collections: HashMap<String, bool>,
    unreachable: bool,
    latency: Option<Duration>,
    requests: Vec<String>,
    last_options: Option<RequestOptions>,
}

impl MockRemote {
    /// Creates a remote with no collections.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the counter served for a collection.
    pub fn set_counter(&self, name: &str, counter: u64) {
        self.state
            .lock()
            .counters
            .insert(name.to_string(), serde_json::json!({ "counter": counter }));
    }

    /// Sets a raw counter response body, e.g. to serve malformed counters.
    pub fn set_counter_body(&self, name: &str, body: Value) {
        self.state.lock().counters.insert(name.to_string(), body);
    }

    /// Sets the payload served for a collection.
    pub fn set_collection(&self, name: &str, payload: Value) {
        self.state
            .lock()
            .collections
            .insert(name.to_string(), payload);
    }

    /// Makes the next `times` counter requests for `name` fail.
    pub fn fail_counter(&self, name: &str, times: u32) {
        self.state
            .lock()
            .counter_failures
            .insert(name.to_string(), times);
    }

    /// Makes every collection request for `name` fail (or succeed again).
    pub fn fail_collection(&self, name: &str, failing: bool) {
        self.state
            .lock()
            .failing_collections
            .insert(name.to_string(), failing);
    }

    /// Makes every request fail.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unreachable = unreachable;
    }

    /// Delays every response.
    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().latency = Some(latency);
    }

    /// Returns every requested path, in order.
    pub fn requests(&self) -> Vec<String> {
        self.state.lock().requests.clone()
    }

    /// Returns how many counter requests were made for `name`.
    pub fn counter_requests(&self, name: &str) -> usize {
        let path = format!("/counter/{name}");
        self.state
            .lock()
            .requests
            .iter()
            .filter(|p| **p == path)
            .count()
    }

    /// Returns how many collection requests were made for `name`.
    pub fn collection_requests(&self, name: &str) -> usize {
        let path = format!("/{name}");
        self.state
            .lock()
            .requests
            .iter()
            .filter(|p| **p == path)
            .count()
    }

    /// Returns the options of the most recent request.
    pub fn last_options(&self) -> Option<RequestOptions> {
        self.state.lock().last_options
    }

    /// Forgets recorded requests.
    pub fn clear_requests(&self) {
        self.state.lock().requests.clear();
    }

    fn respond(&self, path: &str) -> Result<Vec<u8>, String> {
        let mut state = self.state.lock();
        if state.unreachable {
            return Err("connection refused".into());
        }

        let body = if let Some(name) = path.strip_prefix("/counter/") {
            if let Some(remaining) = state.counter_failures.get_mut(name) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(format!("counter for {name} unavailable"));
                }
            }
            state.counters.get(name).cloned()
        } else {
            let name = path.trim_start_matches('/');
            if state.failing_collections.get(name).copied().unwrap_or(false) {
                return Err(format!("collection {name} unavailable"));
            }
            state.collections.get(name).cloned()
        };

        body.map(|b| b.to_string().into_bytes())
            .ok_or_else(|| format!("HTTP 404: {path}"))
    }
}

#[async_trait]
impl HttpClient for MockRemote {
    async fn get(&self, url: &str, options: RequestOptions) -> Result<Vec<u8>, String> {
        let path = match url.rfind("/counter/") {
            Some(i) => url[i..].to_string(),
            None => url
                .rsplit_once('/')
                .map(|(_, name)| format!("/{name}"))
                .unwrap_or_else(|| url.to_string()),
        };

        let latency = {
            let mut state = self.state.lock();
            state.requests.push(path.clone());
            state.last_options = Some(options);
            state.latency
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        self.respond(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn api(remote: &Arc<MockRemote>, config: &SyncConfig) -> RemoteApi {
        RemoteApi::new(config, Arc::clone(remote) as Arc<dyn HttpClient>)
    }

    #[test]
    fn urls_and_timeouts() {
        let config = SyncConfig::new("https://api.example.com/")
            .with_request_timeout(Duration::from_millis(100))
            .with_credentials(true);
        let api = api(&Arc::new(MockRemote::new()), &config);

        assert_eq!(api.base_url(), "https://api.example.com");
        assert_eq!(api.counter_url("users"), "https://api.example.com/counter/users");
        assert_eq!(api.collection_url("users"), "https://api.example.com/users");

        assert_eq!(api.options(RequestKind::CounterCheck).timeout, Duration::from_millis(100));
        assert_eq!(api.options(RequestKind::CounterSync).timeout, Duration::from_millis(200));
        assert_eq!(api.options(RequestKind::Collection).timeout, Duration::from_millis(500));
        assert!(api.options(RequestKind::Collection).with_credentials);
    }

    #[tokio::test]
    async fn counter_and_collection_requests() {
        let remote = Arc::new(MockRemote::new());
        remote.set_counter("users", 5);
        remote.set_collection("users", json!([{"id": 1}]));
        let api = api(&remote, &SyncConfig::new("http://api.test"));

        assert_eq!(api.counter("users", RequestKind::CounterSync).await.unwrap(), 5);
        assert_eq!(api.collection("users").await.unwrap(), json!([{"id": 1}]));
        assert_eq!(remote.requests(), vec!["/counter/users", "/users"]);
        assert_eq!(remote.counter_requests("users"), 1);
        assert_eq!(remote.collection_requests("users"), 1);
        assert_eq!(
            remote.last_options().unwrap().timeout,
            Duration::from_millis(25_000)
        );
    }

    #[tokio::test]
    async fn injected_counter_failures_run_out() {
        let remote = Arc::new(MockRemote::new());
        remote.set_counter("users", 1);
        remote.fail_counter("users", 2);
        let api = api(&remote, &SyncConfig::default());

        for _ in 0..2 {
            let err = api.counter("users", RequestKind::CounterSync).await.unwrap_err();
            assert!(err.is_retryable());
        }
        assert_eq!(api.counter("users", RequestKind::CounterSync).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn missing_resource_is_a_network_error() {
        let remote = Arc::new(MockRemote::new());
        let api = api(&remote, &SyncConfig::default());
        let err = api.collection("ghosts").await.unwrap_err();
        assert!(matches!(err, SyncError::Network { .. }));
    }

    #[tokio::test]
    async fn malformed_counter_is_a_decode_error() {
        let remote = Arc::new(MockRemote::new());
        remote.set_counter_body("users", json!({"count": 3}));
        let api = api(&remote, &SyncConfig::default());
        let err = api.counter("users", RequestKind::CounterCheck).await.unwrap_err();
        assert!(matches!(err, SyncError::Decode(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_responses_time_out() {
        let remote = Arc::new(MockRemote::new());
        remote.set_counter("users", 1);
        remote.set_latency(Duration::from_secs(60));
        let config = SyncConfig::default().with_request_timeout(Duration::from_secs(1));
        let api = api(&remote, &config);

        let err = api.counter("users", RequestKind::CounterSync).await.unwrap_err();
        assert!(matches!(err, SyncError::Timeout));
    }

    #[tokio::test]
    async fn unreachable_remote_fails_everything() {
        let remote = Arc::new(MockRemote::new());
        remote.set_counter("users", 1);
        remote.set_unreachable(true);
        let api = api(&remote, &SyncConfig::default());
        assert!(api.counter("users", RequestKind::CounterSync).await.is_err());
        assert_eq!(remote.requests().len(), 1);
    }
}
