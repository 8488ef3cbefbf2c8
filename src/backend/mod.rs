//! Backend-as-a-Service Client
//!
//! HTTP client for the hosted backend that provides auth, the relational
//! store, object storage and realtime change events. Speaks the
//! Supabase-compatible wire formats:
//! - [`auth`]: GoTrue password grant, sign-up, sign-out, session refresh
//! - [`rest`]: PostgREST table queries
//! - [`storage`]: object upload and public URLs
//! - [`realtime`]: Phoenix-channel change feed over websocket

pub mod auth;
pub mod realtime;
pub mod rest;
pub mod storage;

pub use auth::{AuthEvent, AuthProvider, AuthUser, Credentials, Session};
pub use realtime::{ChangeEvent, ChangeFeed, ChangeFilter, RealtimeClient, Subscription};
pub use rest::TableQuery;
pub use storage::BlobStore;

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};

/// Connection settings for the backend
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Project URL (e.g., "https://abcd.supabase.co")
    pub url: String,
    /// Public anonymous key sent as `apikey` on every request
    pub anon_key: String,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
}

impl From<&crate::config::BackendConfig> for BackendConfig {
    fn from(config: &crate::config::BackendConfig) -> Self {
        Self {
            url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            request_timeout_secs: config.request_timeout_secs,
        }
    }
}

/// Backend client shared by every service
///
/// Holds the current auth session; all requests are authorized with its
/// access token, or with the anon key while signed out.
pub struct BackendClient {
    http: Client,
    config: BackendConfig,
    session: Arc<RwLock<Option<Session>>>,
    events: broadcast::Sender<AuthEvent>,
}

impl BackendClient {
    /// Create a new backend client
    pub fn new(config: BackendConfig) -> BackendResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        let (events, _) = broadcast::channel(16);
        let url = config.url.trim_end_matches('/').to_string();

        Ok(Self {
            http,
            config: BackendConfig { url, ..config },
            session: Arc::new(RwLock::new(None)),
            events,
        })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Realtime client sharing this client's credentials
    pub fn realtime(&self) -> RealtimeClient {
        RealtimeClient::new(
            &self.config.url,
            &self.config.anon_key,
            Arc::clone(&self.session),
        )
    }

    /// Absolute URL for a path under the project URL
    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.url, path.trim_start_matches('/'))
    }

    /// Attach `apikey` and bearer authorization
    async fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone())
            .unwrap_or_else(|| self.config.anon_key.clone());

        request
            .header("apikey", &self.config.anon_key)
            .bearer_auth(token)
    }

    /// Send a request, mapping transport failures
    async fn send(&self, request: RequestBuilder) -> BackendResult<Response> {
        request.send().await.map_err(map_send_error)
    }

    /// Decode a successful JSON body or surface the backend's message
    async fn read_json<T: DeserializeOwned>(response: Response) -> BackendResult<T> {
        let response = Self::check(response).await?;
        response
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    /// Turn a non-success status into [`BackendError::Api`]
    async fn check(response: Response) -> BackendResult<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(BackendError::Api {
            status,
            message: extract_error_message(&body),
        })
    }
}

fn map_send_error(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout
    } else if e.is_connect() {
        BackendError::Unavailable
    } else {
        BackendError::Request(e)
    }
}

/// Best-effort extraction of a human-readable message from an error body
///
/// Auth errors use `msg` / `error_description`, PostgREST uses `message`,
/// storage uses `error` + `message`.
pub(crate) fn extract_error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for field in ["msg", "message", "error_description", "error"] {
            if let Some(text) = value.get(field).and_then(|v| v.as_str()) {
                if !text.is_empty() {
                    return text.to_string();
                }
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "empty response".to_string()
    } else {
        trimmed.to_string()
    }
}

// ============================================
// Errors
// ============================================

/// Errors that can occur when talking to the backend
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Backend unavailable")]
    Unavailable,

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Request timeout")]
    Timeout,

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Backend returned no rows")]
    EmptyResponse,

    #[error("Realtime error: {0}")]
    Realtime(String),

    #[error("Not signed in")]
    NotSignedIn,
}

impl BackendError {
    /// The raw message to show a user, without the status prefix
    pub fn user_message(&self) -> String {
        match self {
            BackendError::Api { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Decode(err.to_string())
    }
}

/// Result type alias for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

#[cfg(test)]
pub(crate) mod test_server {
    //! A throwaway HTTP server for exercising the real client

    use super::{BackendClient, BackendConfig};
    use axum::Router;

    /// Serve `router` on an ephemeral port and return its base URL
    pub async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    pub fn client(url: &str) -> BackendClient {
        BackendClient::new(BackendConfig {
            url: url.to_string(),
            anon_key: "anon-key".to_string(),
            request_timeout_secs: 5,
        })
        .unwrap()
    }
}
