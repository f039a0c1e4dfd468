use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::state::alerts::AlertBook;
use crate::state::feed::{Feed, FeedItem};
use crate::state::market::TrendingAsset;
use crate::state::market_cache::MarketCache;
use crate::state::portfolio::{Portfolio, valuation};

/// Everything the renderer needs for one frame.
#[derive(Clone, Debug, Default, Serialize)]
pub struct DashboardView {
    pub generated_at: DateTime<Utc>,
    pub assets: Vec<AssetCard>,
    pub trending: Vec<TrendingAsset>,
    pub holdings: Vec<HoldingView>,
    /// Sum over holdings with a known price.
    pub portfolio_value: f64,
    pub alerts: Vec<AlertView>,
    pub feed_filter: String,
    pub feed: Vec<FeedItem>,
    pub feed_sources: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AssetCard {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub image: String,
    pub price: f64,
    /// True when the price comes from the stream rather than REST.
    pub live: bool,
    pub change_24h: Option<f64>,
    pub sparkline: Vec<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HoldingView {
    pub asset_id: String,
    pub quantity: Decimal,
    pub price: Option<f64>,
    pub value: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AlertView {
    pub asset_id: String,
    pub target: f64,
}

pub fn build(
    market: &MarketCache,
    alerts: &AlertBook,
    portfolio: &Portfolio,
    trending: &[TrendingAsset],
    feed: &Feed,
) -> DashboardView {
    let assets = market
        .assets()
        .map(|asset| {
            let overlay = market.overlay(&asset.id);
            AssetCard {
                id: asset.id.clone(),
                name: asset.name.clone(),
                symbol: asset.symbol.clone(),
                image: asset.image.clone(),
                price: overlay.unwrap_or(asset.last_price),
                live: overlay.is_some(),
                change_24h: asset.change_24h,
                sparkline: asset.sparkline.clone(),
            }
        })
        .collect();

    let holdings: Vec<HoldingView> = portfolio
        .holdings()
        .map(|(id, quantity)| {
            let price = market.display_price(id);
            HoldingView {
                asset_id: id.clone(),
                quantity: *quantity,
                price,
                value: valuation(*quantity, price),
            }
        })
        .collect();

    let portfolio_value: f64 = holdings.iter().filter_map(|h| h.value).sum();

    let alerts = alerts
        .active()
        .into_iter()
        .map(|(asset_id, target)| AlertView { asset_id, target })
        .collect();

    DashboardView {
        generated_at: Utc::now(),
        assets,
        trending: trending.to_vec(),
        holdings,
        portfolio_value,
        alerts,
        feed_filter: feed.filter().to_string(),
        feed: feed.visible(),
        feed_sources: feed.sources().to_vec(),
    }
}
