use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::market_data::traits::MarketDataSource;
use crate::market_data::types::{AssetDetail, TrendingResponse};
use crate::state::hub::TRENDING_LIMIT;
use crate::state::market::TrendingAsset;

const VS_CURRENCY: &str = "usd";

/// CoinGecko public REST API client.
pub struct CoinGeckoClient {
    base_url: String,
    client: Client,
}

impl CoinGeckoClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("crypto-hub/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    async fn get_text(&self, path: &str, params: &[(&str, String)]) -> Result<String, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, params = params.len(), "GET");

        let response = self.client.get(&url).query(params).send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!(%url, "rate limit exceeded");
            return Err(FetchError::RateLimited);
        }

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.text().await?)
    }

    async fn markets(&self, ids: &[String]) -> Result<Vec<AssetDetail>, FetchError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let params = [
            ("vs_currency", VS_CURRENCY.to_string()),
            ("ids", ids.join(",")),
            ("sparkline", "true".to_string()),
            ("price_change_percentage", "24h".to_string()),
        ];
        let body = self.get_text("/coins/markets", &params).await?;
        decode_markets(&body)
    }
}

#[async_trait]
impl MarketDataSource for CoinGeckoClient {
    async fn fetch_asset(&self, id: &str) -> Result<AssetDetail, FetchError> {
        let rows = self.markets(&[id.to_string()]).await?;
        rows.into_iter()
            .find(|row| row.id == id)
            .ok_or_else(|| FetchError::NotFound(id.to_string()))
    }

    async fn fetch_assets(&self, ids: &[String]) -> Result<Vec<AssetDetail>, FetchError> {
        self.markets(ids).await
    }

    async fn fetch_trending(&self) -> Result<Vec<TrendingAsset>, FetchError> {
        let body = self.get_text("/search/trending", &[]).await?;
        decode_trending(&body)
    }
}

pub fn decode_markets(body: &str) -> Result<Vec<AssetDetail>, FetchError> {
    serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))
}

/// Decodes the trending body as a whole; any malformed row fails the lot.
pub fn decode_trending(body: &str) -> Result<Vec<TrendingAsset>, FetchError> {
    let response: TrendingResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))?;

    Ok(response
        .coins
        .iter()
        .take(TRENDING_LIMIT)
        .map(|coin| TrendingAsset::from(&coin.item))
        .collect())
}
