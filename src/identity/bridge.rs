//! Sign-in with sign-up fallback

use super::credential::derive_credential;
use super::wallet::{primary_account, WalletProvider};
use super::{Identity, IdentityError, IdentityResult};
use crate::address::WalletAddress;
use crate::backend::{AuthProvider, Session};
use crate::local_store::{LocalStore, LocalStoreError, SESSION_KEY, WALLET_ADDRESS_KEY};
use serde_json::json;
use std::sync::Arc;

/// Bridges wallet addresses into backend accounts
pub struct IdentityBridge {
    auth: Arc<dyn AuthProvider>,
    store: LocalStore,
}

impl IdentityBridge {
    pub fn new(auth: Arc<dyn AuthProvider>, store: LocalStore) -> Self {
        Self { auth, store }
    }

    /// Ask the wallet for its account and connect it
    pub async fn connect(&self, wallet: &dyn WalletProvider) -> IdentityResult<Identity> {
        let account = primary_account(wallet).await?;
        self.connect_address(&account).await
    }

    /// Sign in as `raw`; on failure create the account once and use its session
    ///
    /// Nothing is persisted unless a session is established.
    pub async fn connect_address(&self, raw: &str) -> IdentityResult<Identity> {
        let address = WalletAddress::parse(raw)?;
        let credentials = derive_credential(&address);

        let session = match self.auth.sign_in_with_password(&credentials).await {
            Ok(session) => session,
            Err(sign_in_error) => {
                tracing::info!(
                    address = %address,
                    "Sign-in failed ({}), creating account",
                    sign_in_error.user_message()
                );
                let metadata = json!({ "wallet_address": address.as_str() });
                match self.auth.sign_up(&credentials, metadata).await {
                    Ok(Some(session)) => session,
                    Ok(None) => return Err(IdentityError::NoSession),
                    Err(sign_up_error) => {
                        tracing::error!(address = %address, "Auth error: {}", sign_up_error);
                        return Err(IdentityError::Auth {
                            message: sign_up_error.user_message(),
                        });
                    }
                }
            }
        };

        self.store.set(WALLET_ADDRESS_KEY, address.as_str())?;
        persist_session(&self.store, &session)?;

        tracing::info!(address = %address, "Wallet connected");
        Ok(Identity { address, session })
    }
}

/// Store the session so a later run can restore it
pub(crate) fn persist_session(store: &LocalStore, session: &Session) -> Result<(), LocalStoreError> {
    let encoded = serde_json::to_string(session)?;
    store.set(SESSION_KEY, &encoded)
}
