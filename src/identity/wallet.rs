//! Wallet Provider
//!
//! Account access through a wallet's JSON-RPC `eth_requestAccounts` call.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Source of the user's wallet accounts
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Ask the wallet for its accounts (may prompt the user)
    async fn request_accounts(&self) -> Result<Vec<String>, WalletError>;
}

/// First account the wallet exposes
pub async fn primary_account(wallet: &dyn WalletProvider) -> Result<String, WalletError> {
    wallet
        .request_accounts()
        .await?
        .into_iter()
        .next()
        .ok_or(WalletError::NoAccounts)
}

/// Wallet reachable over a local JSON-RPC endpoint (e.g. Frame at
/// `http://127.0.0.1:1248`)
pub struct JsonRpcWallet {
    client: Client,
    rpc_url: String,
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Vec<String>>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

impl JsonRpcWallet {
    pub fn new(rpc_url: &str) -> Result<Self, WalletError> {
        // Prompts wait on the user, so the timeout is generous
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            client,
            rpc_url: rpc_url.to_string(),
        })
    }
}

#[async_trait]
impl WalletProvider for JsonRpcWallet {
    async fn request_accounts(&self) -> Result<Vec<String>, WalletError> {
        let body = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method: "eth_requestAccounts",
            params: Vec::new(),
        };

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    WalletError::NotInstalled
                } else {
                    WalletError::Request(e)
                }
            })?;

        let reply: RpcResponse = response
            .json()
            .await
            .map_err(|e| WalletError::Decode(e.to_string()))?;

        if let Some(error) = reply.error {
            return Err(WalletError::Rejected {
                code: error.code,
                message: error.message,
            });
        }

        let accounts = reply.result.unwrap_or_default();
        tracing::debug!(count = accounts.len(), "Wallet returned accounts");
        Ok(accounts)
    }
}

/// A fixed account, for headless use
#[derive(Debug, Clone)]
pub struct StaticWallet {
    address: String,
}

impl StaticWallet {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

#[async_trait]
impl WalletProvider for StaticWallet {
    async fn request_accounts(&self) -> Result<Vec<String>, WalletError> {
        Ok(vec![self.address.clone()])
    }
}

/// Wallet provider errors
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("No wallet found. Start a wallet that exposes a local JSON-RPC endpoint, or pass --address")]
    NotInstalled,

    #[error("Wallet returned no accounts")]
    NoAccounts,

    #[error("Wallet rejected the request ({code}): {message}")]
    Rejected { code: i64, message: String },

    #[error("Wallet request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Unexpected wallet response: {0}")]
    Decode(String),
}
