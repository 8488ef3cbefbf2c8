//! Derived credentials
//!
//! The backend only knows email/password accounts, so each wallet address maps
//! to a deterministic pair. Anyone who knows an address can derive its
//! credential; wallet ownership is never proven to the backend.

use crate::address::WalletAddress;
use crate::backend::Credentials;

/// Pseudo-domain of derived account emails
pub const CREDENTIAL_DOMAIN: &str = "kraken.web3";

/// Email `{address}@kraken.web3`, password `{address}`
pub fn derive_credential(address: &WalletAddress) -> Credentials {
    Credentials {
        email: format!("{}@{}", address, CREDENTIAL_DOMAIN),
        password: address.to_string(),
    }
}
