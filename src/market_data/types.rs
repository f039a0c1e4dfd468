use serde::Deserialize;
use std::collections::HashMap;
use tokio::sync::oneshot;

use crate::commands::{Command, CommandReply};
use crate::error::FetchError;
use crate::state::market::TrendingAsset;
use crate::state::market_cache::FetchTicket;

/// One row of `GET /coins/markets`.
#[derive(Debug, Clone, Deserialize)]
pub struct AssetDetail {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub image: Option<String>,
    pub current_price: Option<f64>,
    pub price_change_percentage_24h: Option<f64>,
    #[serde(default)]
    pub sparkline_in_7d: Option<SparklineIn7d>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SparklineIn7d {
    #[serde(default)]
    pub price: Vec<f64>,
}

impl AssetDetail {
    pub fn sparkline(&self) -> &[f64] {
        self.sparkline_in_7d
            .as_ref()
            .map(|s| s.price.as_slice())
            .unwrap_or(&[])
    }
}

/// Body of `GET /search/trending`.
#[derive(Debug, Clone, Deserialize)]
pub struct TrendingResponse {
    pub coins: Vec<TrendingCoin>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrendingCoin {
    pub item: TrendingItem,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrendingItem {
    pub id: String,
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub thumb: String,
    #[serde(default)]
    pub data: Option<TrendingItemData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrendingItemData {
    #[serde(default)]
    pub price_change_percentage_24h: HashMap<String, f64>,
}

impl TrendingItem {
    pub fn change_24h_usd(&self) -> Option<f64> {
        self.data
            .as_ref()
            .and_then(|d| d.price_change_percentage_24h.get("usd").copied())
    }
}

/// One unordered batch of streamed prices, keyed by asset id.
pub type PriceBatch = HashMap<String, f64>;

/// Everything the router reacts to, one at a time.
#[derive(Debug)]
pub enum HubEvent {
    /// A user command, with an optional channel for the inline reply.
    Command {
        command: Command,
        reply: Option<oneshot::Sender<CommandReply>>,
    },
    AssetFetched {
        asset_id: String,
        ticket: FetchTicket,
        result: Result<AssetDetail, FetchError>,
    },
    RefreshDue,
    RefreshFetched {
        requested: Vec<(String, FetchTicket)>,
        result: Result<Vec<AssetDetail>, FetchError>,
    },
    TrendingDue,
    TrendingFetched(Result<Vec<TrendingAsset>, FetchError>),
    Prices(PriceBatch),
}
