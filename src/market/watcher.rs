//! Market Watcher and Price Chart
//!
//! `MarketWatcher` polls the overview on an interval and publishes on a
//! watch channel. `PriceChart` holds the chart selection and its series.

use super::client::{MarketResult, MarketSource};
use super::types::{Asset, PricePoint, Timeframe, DEFAULT_ASSET};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Polled list of top assets
///
/// Fetches immediately, then once per interval. A failed poll leaves the
/// previous list published. Polling stops when the watcher is dropped.
pub struct MarketWatcher {
    assets: watch::Receiver<Vec<Asset>>,
    task: JoinHandle<()>,
}

impl MarketWatcher {
    pub fn spawn(source: Arc<dyn MarketSource>, interval: Duration) -> Self {
        let (tx, rx) = watch::channel(Vec::new());
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match source.top_assets().await {
                    Ok(assets) => {
                        if tx.send(assets).is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::error!("Error fetching crypto data: {}", e),
                }
            }
        });
        Self { assets: rx, task }
    }

    /// Most recently published list (empty before the first success)
    pub fn latest(&self) -> Vec<Asset> {
        self.assets.borrow().clone()
    }

    /// Wait for the next successful poll
    pub async fn changed(&mut self) -> Option<Vec<Asset>> {
        self.assets.changed().await.ok()?;
        Some(self.assets.borrow_and_update().clone())
    }
}

impl Drop for MarketWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Chart selection and the series shown for it
pub struct PriceChart {
    source: Arc<dyn MarketSource>,
    asset: String,
    timeframe: Timeframe,
    series: Vec<PricePoint>,
}

impl PriceChart {
    /// `bitcoin` over 24h, nothing loaded yet
    pub fn new(source: Arc<dyn MarketSource>) -> Self {
        Self {
            source,
            asset: DEFAULT_ASSET.to_string(),
            timeframe: Timeframe::default(),
            series: Vec::new(),
        }
    }

    pub fn asset(&self) -> &str {
        &self.asset
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn series(&self) -> &[PricePoint] {
        &self.series
    }

    /// Select asset and timeframe together with a single fetch
    pub async fn select(&mut self, asset_id: &str, timeframe: Timeframe) -> MarketResult<()> {
        self.asset = asset_id.to_string();
        self.timeframe = timeframe;
        self.refresh().await
    }

    /// Select an asset and fetch its history, even if already selected
    pub async fn select_asset(&mut self, asset_id: &str) -> MarketResult<()> {
        self.asset = asset_id.to_string();
        self.refresh().await
    }

    /// Select a timeframe and fetch, even if already selected
    pub async fn select_timeframe(&mut self, timeframe: Timeframe) -> MarketResult<()> {
        self.timeframe = timeframe;
        self.refresh().await
    }

    /// One history fetch for the current selection
    ///
    /// On failure the previous series stays.
    pub async fn refresh(&mut self) -> MarketResult<()> {
        match self.source.price_history(&self.asset, self.timeframe).await {
            Ok(series) => {
                self.series = series;
                Ok(())
            }
            Err(e) => {
                tracing::error!(asset = %self.asset, timeframe = %self.timeframe, "Error fetching chart data: {}", e);
                Err(e)
            }
        }
    }
}
