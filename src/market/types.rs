//! Market data types

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Asset selected when the wallet page opens
pub const DEFAULT_ASSET: &str = "bitcoin";

/// One row of the markets endpoint
///
/// Numeric fields are nullable for freshly listed assets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,
    #[serde(default)]
    pub total_volume: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub image: Option<String>,
}

/// Chart window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Timeframe {
    #[default]
    Day,
    Week,
    Month,
    Year,
}

impl Timeframe {
    pub const ALL: [Timeframe; 4] = [Timeframe::Day, Timeframe::Week, Timeframe::Month, Timeframe::Year];

    /// `days` parameter of the chart endpoint
    pub fn days(&self) -> u32 {
        match self {
            Timeframe::Day => 1,
            Timeframe::Week => 7,
            Timeframe::Month => 30,
            Timeframe::Year => 365,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Day => "24h",
            Timeframe::Week => "7d",
            Timeframe::Month => "30d",
            Timeframe::Year => "1y",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected timeframe input
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown timeframe {0:?} (expected 24h, 7d, 30d or 1y)")]
pub struct UnknownTimeframe(pub String);

impl FromStr for Timeframe {
    type Err = UnknownTimeframe;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "24h" => Ok(Timeframe::Day),
            "7d" => Ok(Timeframe::Week),
            "30d" => Ok(Timeframe::Month),
            "1y" => Ok(Timeframe::Year),
            other => Err(UnknownTimeframe(other.to_string())),
        }
    }
}

/// One chart sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Unix seconds
    pub time: i64,
    pub value: f64,
}

/// Turn `[ms, price]` pairs into a chart series
///
/// Times are floored to seconds; the first sample for each second is kept and
/// the result is sorted ascending.
pub fn process_series(prices: &[[f64; 2]]) -> Vec<PricePoint> {
    let mut seen = HashSet::new();
    let mut points: Vec<PricePoint> = prices
        .iter()
        .map(|[ms, price]| PricePoint {
            time: (ms / 1000.0).floor() as i64,
            value: *price,
        })
        .filter(|point| seen.insert(point.time))
        .collect();
    points.sort_by_key(|point| point.time);
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_parsing_and_days() {
        assert_eq!(Timeframe::default(), Timeframe::Day);
        assert_eq!("7d".parse::<Timeframe>().unwrap().days(), 7);
        assert_eq!("1Y".parse::<Timeframe>().unwrap(), Timeframe::Year);
        assert_eq!(
            Timeframe::ALL.iter().map(Timeframe::days).collect::<Vec<_>>(),
            vec![1, 7, 30, 365]
        );
        assert!("2w".parse::<Timeframe>().is_err());
    }

    #[test]
    fn test_duplicate_timestamps_keep_first_and_sort() {
        let raw = [
            [1_700_000_002_500.0, 3.0],
            [1_700_000_001_000.0, 1.0],
            [1_700_000_001_999.0, 9.0],
            [1_700_000_000_000.0, 0.5],
            [1_700_000_002_000.0, 7.0],
        ];
        let series = process_series(&raw);
        assert_eq!(
            series,
            vec![
                PricePoint { time: 1_700_000_000, value: 0.5 },
                PricePoint { time: 1_700_000_001, value: 1.0 },
                PricePoint { time: 1_700_000_002, value: 3.0 },
            ]
        );
    }

    #[test]
    fn test_asset_tolerates_null_numbers() {
        let asset: Asset = serde_json::from_str(
            r#"{"id":"newcoin","symbol":"new","name":"New","current_price":null,"market_cap":null}"#,
        )
        .unwrap();
        assert!(asset.current_price.is_none());
        assert!(asset.image.is_none());
    }
}
