//! Wallet addresses
//!
//! Every address that reaches the backend is trimmed and lowercased first, so
//! participant lists, sender fields and profile keys compare byte-for-byte.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

fn address_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^0x[0-9a-f]{40}$").expect("address pattern is valid"))
}

/// A normalised 20-byte EVM address (`0x` + 40 lowercase hex digits)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WalletAddress(String);

impl WalletAddress {
    /// Normalise and validate a user- or wallet-supplied address
    pub fn parse(raw: &str) -> Result<Self, InvalidAddress> {
        let normalized = raw.trim().to_lowercase();
        if address_pattern().is_match(&normalized) {
            Ok(Self(normalized))
        } else {
            Err(InvalidAddress(raw.trim().to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compact form for lists and headers: `0x1234...abcd`
    pub fn short(&self) -> String {
        abbreviate(&self.0)
    }

    /// Case-insensitive comparison against a raw address from the store
    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other.trim())
    }
}

/// Abbreviate a hex address as `0x1234...abcd`
pub fn abbreviate(addr: &str) -> String {
    if addr.len() > 10 {
        format!("{}...{}", &addr[..6], &addr[addr.len() - 4..])
    } else {
        addr.to_string()
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for WalletAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for WalletAddress {
    type Error = InvalidAddress;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<WalletAddress> for String {
    fn from(value: WalletAddress) -> Self {
        value.0
    }
}

/// Rejected address input
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid wallet address: {0:?}")]
pub struct InvalidAddress(pub String);
