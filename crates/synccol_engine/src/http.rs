//! HTTP client abstraction.
//!
//! The engine talks to the remote API through [`HttpClient`], so hosts can
//! plug in any HTTP library. With the `reqwest-client` feature,
//! [`ReqwestClient`] provides a ready-made implementation.

use async_trait::async_trait;
use std::time::Duration;

/// Per-request options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestOptions {
    /// Time allowed for the whole request.
    pub timeout: Duration,
    /// Whether the request carries the host's credentials.
    pub with_credentials: bool,
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends a GET request and returns the response body.
    ///
    /// Non-success statuses must be reported as errors.
    async fn get(&self, url: &str, options: RequestOptions) -> Result<Vec<u8>, String>;
}

#[cfg(feature = "reqwest-client")]
pub use self::reqwest_client::ReqwestClient;

#[cfg(feature = "reqwest-client")]
mod reqwest_client {
    use super::{HttpClient, RequestOptions};
    use async_trait::async_trait;
    use reqwest::Client;
    use tracing::debug;

    /// [`HttpClient`] backed by `reqwest`.
    ///
    /// Credentials are a bearer token, sent only on requests made with
    /// `with_credentials`.
    #[derive(Debug, Clone, Default)]
    pub struct ReqwestClient {
        client: Client,
        bearer_token: Option<String>,
    }

    impl ReqwestClient {
        /// Creates a client without credentials.
        pub fn new() -> Self {
            Self::default()
        }

        /// Creates a client around an existing `reqwest::Client`.
        pub fn from_client(client: Client) -> Self {
            Self {
                client,
                bearer_token: None,
            }
        }

        /// Sets the bearer token used as credentials.
        pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
            self.bearer_token = Some(token.into());
            self
        }
    }

    #[async_trait]
    impl HttpClient for ReqwestClient {
        async fn get(&self, url: &str, options: RequestOptions) -> Result<Vec<u8>, String> {
            let mut request = self.client.get(url).timeout(options.timeout);
            if options.with_credentials {
                if let Some(token) = &self.bearer_token {
                    request = request.bearer_auth(token);
                }
            }

            debug!(url, timeout_ms = options.timeout.as_millis() as u64, "GET");
            let response = request.send().await.map_err(|e| e.to_string())?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(format!("HTTP {}: {}", status, body));
            }

            response
                .bytes()
                .await
                .map(|body| body.to_vec())
                .map_err(|e| e.to_string())
        }
    }
}
