//! Price API Client
//!
//! HTTP client for the CoinGecko-compatible markets and chart endpoints.

use super::types::{process_series, Asset, PricePoint, Timeframe};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Source of market data
#[async_trait]
pub trait MarketSource: Send + Sync {
    /// Top assets by market cap
    async fn top_assets(&self) -> MarketResult<Vec<Asset>>;

    /// Processed price series for one asset
    async fn price_history(&self, asset_id: &str, timeframe: Timeframe) -> MarketResult<Vec<PricePoint>>;
}

/// Configuration for the price API client
#[derive(Debug, Clone)]
pub struct MarketClientConfig {
    /// Base URL (e.g., "https://api.coingecko.com/api/v3")
    pub base_url: String,
    /// Quote currency
    pub vs_currency: String,
    /// Assets per markets page
    pub per_page: u32,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for MarketClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.coingecko.com/api/v3".to_string(),
            vs_currency: "usd".to_string(),
            per_page: 10,
            request_timeout_secs: 15,
        }
    }
}

impl From<&crate::config::MarketConfig> for MarketClientConfig {
    fn from(config: &crate::config::MarketConfig) -> Self {
        Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            vs_currency: config.vs_currency.clone(),
            per_page: config.per_page,
            request_timeout_secs: config.request_timeout_secs,
        }
    }
}

#[derive(Deserialize)]
struct ChartResponse {
    prices: Vec<[f64; 2]>,
}

/// CoinGecko-compatible price API client
pub struct CoinGeckoClient {
    client: Client,
    config: MarketClientConfig,
}

impl CoinGeckoClient {
    pub fn new(config: MarketClientConfig) -> MarketResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("kraken/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &MarketClientConfig {
        &self.config
    }

    fn markets_url(&self) -> String {
        format!(
            "{}/coins/markets?vs_currency={}&order=market_cap_desc&per_page={}&sparkline=false",
            self.config.base_url,
            urlencoding::encode(&self.config.vs_currency),
            self.config.per_page
        )
    }

    fn chart_url(&self, asset_id: &str, timeframe: Timeframe) -> String {
        format!(
            "{}/coins/{}/market_chart?vs_currency={}&days={}",
            self.config.base_url,
            urlencoding::encode(asset_id),
            urlencoding::encode(&self.config.vs_currency),
            timeframe.days()
        )
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> MarketResult<T> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                MarketError::Timeout
            } else if e.is_connect() {
                MarketError::Unavailable
            } else {
                MarketError::Request(e)
            }
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketError::RateLimited);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(MarketError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| MarketError::Decode(e.to_string()))
    }
}

#[async_trait]
impl MarketSource for CoinGeckoClient {
    async fn top_assets(&self) -> MarketResult<Vec<Asset>> {
        let assets: Vec<Asset> = self.get_json(&self.markets_url()).await?;
        tracing::debug!(count = assets.len(), "Fetched market overview");
        Ok(assets)
    }

    async fn price_history(&self, asset_id: &str, timeframe: Timeframe) -> MarketResult<Vec<PricePoint>> {
        let chart: ChartResponse = self.get_json(&self.chart_url(asset_id, timeframe)).await?;
        let series = process_series(&chart.prices);
        tracing::debug!(
            asset = %asset_id,
            timeframe = %timeframe,
            raw = chart.prices.len(),
            points = series.len(),
            "Fetched price history"
        );
        Ok(series)
    }
}

/// Errors from the price API
#[derive(Error, Debug)]
pub enum MarketError {
    #[error("Price API unavailable")]
    Unavailable,

    #[error("Request timeout")]
    Timeout,

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Price API rate limit reached, try again shortly")]
    RateLimited,

    #[error("Price API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected price API response: {0}")]
    Decode(String),
}

/// Result type alias for market operations
pub type MarketResult<T> = Result<T, MarketError>;
