//! Auth Endpoints
//!
//! Password sign-in, sign-up, session refresh and sign-out, plus a broadcast
//! channel of auth-state changes.

use super::{BackendClient, BackendError, BackendResult};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Seconds before expiry at which a session is treated as expired
const EXPIRY_MARGIN_SECS: i64 = 10;

/// Email/password pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Authenticated user as reported by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

/// A backend session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: i64,
    /// Unix seconds; filled from `expires_in` when the backend omits it
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl Session {
    fn with_expiry(mut self) -> Self {
        if self.expires_at.is_none() && self.expires_in > 0 {
            self.expires_at = Some(Utc::now().timestamp() + self.expires_in);
        }
        self
    }

    /// Whether the access token is expired (or about to be) at `now` (unix seconds)
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at
            .map(|at| at - EXPIRY_MARGIN_SECS <= now)
            .unwrap_or(false)
    }
}

/// Auth-state change notifications
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    SignedIn(Session),
    TokenRefreshed(Session),
    SignedOut,
}

/// Password-based identity provider
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Sign in with an email/password pair
    async fn sign_in_with_password(&self, credentials: &Credentials) -> BackendResult<Session>;

    /// Create an account; `None` when the backend created the user without
    /// issuing a session (email confirmation enabled)
    async fn sign_up(
        &self,
        credentials: &Credentials,
        metadata: serde_json::Value,
    ) -> BackendResult<Option<Session>>;

    /// Current session, refreshed first if it has expired
    async fn get_session(&self) -> BackendResult<Option<Session>>;

    /// Install a session persisted by an earlier run
    async fn restore_session(&self, session: Session);

    /// End the session remotely and locally
    async fn sign_out(&self) -> BackendResult<()>;

    /// Receive auth-state changes
    fn auth_events(&self) -> broadcast::Receiver<AuthEvent>;
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct SignUpRequest<'a> {
    email: &'a str,
    password: &'a str,
    data: serde_json::Value,
}

#[derive(Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

impl BackendClient {
    /// Requests that must not carry a user token
    fn anonymous(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.config.anon_key)
            .bearer_auth(&self.config.anon_key)
    }

    async fn store_session(&self, session: Session, event: fn(Session) -> AuthEvent) -> Session {
        *self.session.write().await = Some(session.clone());
        // No receivers is fine
        let _ = self.events.send(event(session.clone()));
        session
    }

    async fn clear_session(&self) {
        let had_session = self.session.write().await.take().is_some();
        if had_session {
            let _ = self.events.send(AuthEvent::SignedOut);
        }
    }

    async fn refresh(&self, refresh_token: &str) -> BackendResult<Session> {
        let request = self
            .http
            .post(self.endpoint("auth/v1/token?grant_type=refresh_token"))
            .json(&RefreshGrant { refresh_token });
        let response = self.send(self.anonymous(request)).await?;
        let session: Session = Self::read_json(response).await?;
        Ok(session.with_expiry())
    }
}

#[async_trait]
impl AuthProvider for BackendClient {
    async fn sign_in_with_password(&self, credentials: &Credentials) -> BackendResult<Session> {
        let request = self
            .http
            .post(self.endpoint("auth/v1/token?grant_type=password"))
            .json(&PasswordGrant {
                email: &credentials.email,
                password: &credentials.password,
            });
        let response = self.send(self.anonymous(request)).await?;
        let session: Session = Self::read_json(response).await?;

        tracing::debug!(user_id = %session.user.id, "Signed in");
        Ok(self.store_session(session.with_expiry(), AuthEvent::SignedIn).await)
    }

    async fn sign_up(
        &self,
        credentials: &Credentials,
        metadata: serde_json::Value,
    ) -> BackendResult<Option<Session>> {
        let request = self.http.post(self.endpoint("auth/v1/signup")).json(&SignUpRequest {
            email: &credentials.email,
            password: &credentials.password,
            data: metadata,
        });
        let response = self.send(self.anonymous(request)).await?;
        let body: serde_json::Value = Self::read_json(response).await?;

        if body.get("access_token").is_none() {
            tracing::warn!(email = %credentials.email, "Account created without a session");
            return Ok(None);
        }

        let session: Session = serde_json::from_value(body)?;
        tracing::debug!(user_id = %session.user.id, "Signed up");
        Ok(Some(
            self.store_session(session.with_expiry(), AuthEvent::SignedIn).await,
        ))
    }

    async fn get_session(&self) -> BackendResult<Option<Session>> {
        let current = self.session.read().await.clone();
        let Some(session) = current else {
            return Ok(None);
        };

        if !session.is_expired_at(Utc::now().timestamp()) {
            return Ok(Some(session));
        }

        tracing::debug!("Session expired, refreshing");
        match self.refresh(&session.refresh_token).await {
            Ok(fresh) => Ok(Some(
                self.store_session(fresh, AuthEvent::TokenRefreshed).await,
            )),
            Err(BackendError::Api { status, message }) => {
                tracing::warn!(status, "Session refresh rejected: {}", message);
                self.clear_session().await;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn restore_session(&self, session: Session) {
        *self.session.write().await = Some(session);
    }

    async fn sign_out(&self) -> BackendResult<()> {
        let token = self
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone());

        // Local state goes regardless of what the remote call does
        self.clear_session().await;

        let Some(token) = token else {
            return Ok(());
        };

        let request = self
            .http
            .post(self.endpoint("auth/v1/logout"))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(token);
        let response = self.send(request).await?;
        Self::check(response).await?;
        Ok(())
    }

    fn auth_events(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}
