//! Authentication Context
//!
//! App-wide view of who is signed in. Authenticated means the backend holds
//! a live session AND a wallet address is stored locally.

use super::bridge::{persist_session, IdentityBridge};
use super::wallet::WalletProvider;
use super::{Identity, IdentityResult};
use crate::address::WalletAddress;
use crate::backend::{AuthEvent, AuthProvider, Session};
use crate::local_store::{LocalStore, SESSION_KEY, WALLET_ADDRESS_KEY};
use std::sync::Arc;

/// Current authentication status
#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    Unauthenticated,
    Authenticated(Identity),
}

/// Authentication context shared by every page
pub struct AuthContext {
    auth: Arc<dyn AuthProvider>,
    store: LocalStore,
    state: AuthState,
}

impl AuthContext {
    /// A signed-out context
    pub fn new(auth: Arc<dyn AuthProvider>, store: LocalStore) -> Self {
        Self {
            auth,
            store,
            state: AuthState::Unauthenticated,
        }
    }

    /// Rebuild the context from the persisted session and address
    ///
    /// Without both, the stored address is cleared. A session that cannot be
    /// looked up (e.g. an expired token with the backend unreachable) counts
    /// as none.
    pub async fn restore(auth: Arc<dyn AuthProvider>, store: LocalStore) -> IdentityResult<Self> {
        if let Some(raw) = store.get(SESSION_KEY) {
            match serde_json::from_str::<Session>(&raw) {
                Ok(session) => auth.restore_session(session).await,
                Err(e) => {
                    tracing::warn!("Discarding unreadable stored session: {}", e);
                    store.remove(SESSION_KEY)?;
                }
            }
        }

        let session = match auth.get_session().await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("Could not restore session: {}", e);
                None
            }
        };
        let address = store
            .get(WALLET_ADDRESS_KEY)
            .and_then(|raw| WalletAddress::parse(&raw).ok());

        let mut context = Self::new(auth, store);
        match (session, address) {
            (Some(session), Some(address)) => {
                // The session may have been refreshed on the way
                persist_session(&context.store, &session)?;
                tracing::debug!(address = %address, "Session restored");
                context.state = AuthState::Authenticated(Identity { address, session });
            }
            _ => {
                context.store.remove(WALLET_ADDRESS_KEY)?;
                context.store.remove(SESSION_KEY)?;
                tracing::debug!("No valid session to restore");
            }
        }
        Ok(context)
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn identity(&self) -> Option<&Identity> {
        match &self.state {
            AuthState::Authenticated(identity) => Some(identity),
            AuthState::Unauthenticated => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity().is_some()
    }

    /// Connect the wallet's account and become authenticated
    pub async fn sign_in(&mut self, wallet: &dyn WalletProvider) -> IdentityResult<Identity> {
        let bridge = IdentityBridge::new(Arc::clone(&self.auth), self.store.clone());
        let identity = bridge.connect(wallet).await?;
        self.state = AuthState::Authenticated(identity.clone());
        Ok(identity)
    }

    /// Fold a backend auth-state change into the context
    pub fn apply(&mut self, event: AuthEvent) -> IdentityResult<()> {
        match event {
            AuthEvent::SignedIn(session) | AuthEvent::TokenRefreshed(session) => {
                let address = self
                    .store
                    .get(WALLET_ADDRESS_KEY)
                    .and_then(|raw| WalletAddress::parse(&raw).ok());
                if let Some(address) = address {
                    persist_session(&self.store, &session)?;
                    self.state = AuthState::Authenticated(Identity { address, session });
                }
            }
            AuthEvent::SignedOut => {
                self.store.remove(SESSION_KEY)?;
                self.state = AuthState::Unauthenticated;
            }
        }
        Ok(())
    }

    /// Sign out remotely and forget the local identity
    ///
    /// Local state is cleared even when the remote sign-out fails.
    pub async fn logout(&mut self) -> IdentityResult<()> {
        if let Err(e) = self.auth.sign_out().await {
            tracing::warn!("Remote sign-out failed: {}", e);
        }
        self.store.remove(WALLET_ADDRESS_KEY)?;
        self.store.remove(SESSION_KEY)?;
        self.state = AuthState::Unauthenticated;
        tracing::info!("Logged out");
        Ok(())
    }
}
