//! Wallet page: market overview and price chart

use super::format::{format_change, format_usd, sparkline};
use crate::market::{Asset, PricePoint, Timeframe};

const CHART_WIDTH: usize = 60;

fn usd_or_dash(value: Option<f64>) -> String {
    value.map(format_usd).unwrap_or_else(|| "-".to_string())
}

/// Top assets table
pub fn render_market_table(assets: &[Asset]) -> String {
    if assets.is_empty() {
        return "Loading market data...\n".to_string();
    }

    let mut out = format!(
        "{:<3} {:<14} {:<6} {:>14} {:>10} {:>22} {:>22}\n",
        "#", "Name", "Symbol", "Price", "24h", "Volume", "Market Cap"
    );
    for (rank, asset) in assets.iter().enumerate() {
        out.push_str(&format!(
            "{:<3} {:<14} {:<6} {:>14} {:>10} {:>22} {:>22}\n",
            rank + 1,
            asset.name,
            asset.symbol.to_uppercase(),
            usd_or_dash(asset.current_price),
            format_change(asset.price_change_percentage_24h),
            usd_or_dash(asset.total_volume),
            usd_or_dash(asset.market_cap),
        ));
    }
    out
}

/// Price chart as a sparkline with min / max / last
pub fn render_chart(asset: &str, timeframe: Timeframe, series: &[PricePoint]) -> String {
    let tabs: Vec<String> = Timeframe::ALL
        .iter()
        .map(|t| {
            if *t == timeframe {
                format!("[{}]", t)
            } else {
                t.to_string()
            }
        })
        .collect();
    let mut out = format!("{} price  {}\n", asset, tabs.join(" "));

    if series.is_empty() {
        out.push_str("No chart data\n");
        return out;
    }

    let values: Vec<f64> = series.iter().map(|p| p.value).collect();
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let last = values[values.len() - 1];

    out.push_str(&sparkline(&values, CHART_WIDTH));
    out.push('\n');
    out.push_str(&format!(
        "min {}  max {}  last {}  ({} points)\n",
        format_usd(min),
        format_usd(max),
        format_usd(last),
        series.len()
    ));
    out
}
