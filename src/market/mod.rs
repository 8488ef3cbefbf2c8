//! Market Data
//!
//! Top assets by market cap and historical price series from a
//! CoinGecko-compatible price API.
//!
//! - [`types`]: assets, timeframes and series processing
//! - [`client`]: the HTTP source
//! - [`watcher`]: the polled asset list and the price chart state

pub mod client;
pub mod types;
pub mod watcher;

pub use client::{CoinGeckoClient, MarketClientConfig, MarketError, MarketResult, MarketSource};
pub use types::{process_series, Asset, PricePoint, Timeframe, DEFAULT_ASSET};
pub use watcher::{MarketWatcher, PriceChart};
