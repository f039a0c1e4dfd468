use async_trait::async_trait;

use crate::error::FetchError;
use crate::market_data::types::AssetDetail;
use crate::state::market::TrendingAsset;

/// REST collaborator the router fetches through.
///
/// Kept behind a trait so the router can be driven by a mock in tests.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Detail for a single asset. An unknown id is `FetchError::NotFound`.
    async fn fetch_asset(&self, id: &str) -> Result<AssetDetail, FetchError>;

    /// Details for several assets in one request. Unknown ids are simply
    /// absent from the result.
    async fn fetch_assets(&self, ids: &[String]) -> Result<Vec<AssetDetail>, FetchError>;

    /// Current trending list, already capped and converted.
    async fn fetch_trending(&self) -> Result<Vec<TrendingAsset>, FetchError>;
}
