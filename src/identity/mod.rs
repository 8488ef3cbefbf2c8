//! Identity Bridge
//!
//! Turns a wallet address into a backend session:
//! - [`wallet`]: asks the wallet provider for accounts
//! - [`credential`]: derives the email/password pair for an address
//! - [`bridge`]: sign in, falling back to a single sign-up
//! - [`session`]: the app-wide authentication context

pub mod bridge;
pub mod credential;
pub mod session;
pub mod wallet;

pub use bridge::IdentityBridge;
pub use credential::derive_credential;
pub use session::{AuthContext, AuthState};
pub use wallet::{JsonRpcWallet, StaticWallet, WalletError, WalletProvider};

use crate::address::{InvalidAddress, WalletAddress};
use crate::backend::{BackendError, Session};
use crate::local_store::LocalStoreError;
use thiserror::Error;

/// An authenticated wallet identity
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub address: WalletAddress,
    pub session: Session,
}

/// Identity errors
#[derive(Error, Debug)]
pub enum IdentityError {
    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    InvalidAddress(#[from] InvalidAddress),

    /// Both sign-in and sign-up failed; carries the backend's message
    #[error("{message}")]
    Auth { message: String },

    #[error("Account created but no session was issued; confirm the account, then connect again")]
    NoSession,

    #[error("Local storage error: {0}")]
    LocalStore(#[from] LocalStoreError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

/// Result type alias for identity operations
pub type IdentityResult<T> = Result<T, IdentityError>;
