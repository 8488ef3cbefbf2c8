//! # Kraken
//!
//! Wallet-authenticated messaging and market data client.
//!
//! ## Features
//!
//! - **Wallet sign-in**: a wallet address is turned into backend credentials,
//!   falling back to sign-up on first use
//! - **Direct messages**: conversations, messages and file attachments stored
//!   in a hosted backend, refreshed live over its change feed
//! - **Market data**: top assets by market cap and price charts per timeframe
//! - **Profiles**: username, bio and avatar per address, with search
//!
//! ## Modules
//!
//! - [`backend`]: auth, table, storage and realtime clients
//! - [`identity`]: wallet providers, credential derivation, auth context
//! - [`messaging`]: conversations, messages, live threads
//! - [`market`]: price API client, overview poller, chart state
//! - [`profiles`]: profile load, edit and search
//! - [`views`]: route guard and text pages
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kraken::app::App;
//! use kraken::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut app = App::from_config(Config::load_default()).await?;
//!
//!     let identity = app
//!         .login(Some("0x742d35Cc6634C0532925a3b844Bc454e4438f44e"))
//!         .await?;
//!
//!     let conversations = app.conversations().list_for(&identity.address).await?;
//!     println!("{} conversations", conversations.len());
//!
//!     Ok(())
//! }
//! ```

pub mod address;
pub mod app;
pub mod attachments;
pub mod backend;
pub mod config;
pub mod identity;
pub mod local_store;
pub mod market;
pub mod messaging;
pub mod profiles;
pub mod views;

#[cfg(test)]
mod testing;

pub use address::{InvalidAddress, WalletAddress};
pub use app::{App, AppError, AppResult};
pub use config::Config;
