use rust_decimal::Decimal;
use std::collections::HashSet;

use crate::error::{FetchError, InputError};
use crate::market_data::types::{AssetDetail, PriceBatch};
use crate::state::alerts::{AlertBook, FiredAlert};
use crate::state::feed::{Feed, FeedFilter};
use crate::state::market::{TrackedAsset, TrendingAsset};
use crate::state::market_cache::{FetchTicket, MarketCache};
use crate::state::portfolio::Portfolio;
use crate::state::view::{self, DashboardView};

/// Most trending rows kept per refresh.
pub const TRENDING_LIMIT: usize = 3;

/// Result of applying an add-fetch completion.
#[derive(Debug)]
pub enum FetchOutcome {
    Inserted,
    /// The asset was removed (or re-added) while the fetch was in flight.
    Stale,
    Failed(FetchError),
}

/// What a periodic refresh did to each row it was asked about.
#[derive(Debug, Default)]
pub struct RefreshSummary {
    pub replaced: usize,
    /// Rows for assets removed or re-added since the refresh was requested.
    pub stale: Vec<String>,
    /// Rows that carried no usable data; the previous snapshot is kept.
    pub rejected: Vec<(String, FetchError)>,
    /// Requested assets, still tracked, that the response left out.
    pub missing: Vec<String>,
}

/// The whole dashboard read model. Owned by a single task; every operation
/// takes one event and runs to completion.
#[derive(Clone, Debug)]
pub struct HubState {
    market: MarketCache,
    alerts: AlertBook,
    portfolio: Portfolio,
    trending: Vec<TrendingAsset>,
    feed: Feed,
    sparkline_points: usize,
}

impl HubState {
    pub fn new(sparkline_points: usize) -> Self {
        Self {
            market: MarketCache::new(),
            alerts: AlertBook::new(),
            portfolio: Portfolio::new(),
            trending: Vec::new(),
            feed: Feed::new(),
            sparkline_points,
        }
    }

    /// Starts tracking `id`. Returns the ticket to fetch with, or `None` if
    /// the asset is already tracked or being fetched.
    pub fn add_asset(&mut self, id: &str) -> Result<Option<FetchTicket>, InputError> {
        let id = normalize_id(id)?;
        Ok(self.market.begin_fetch(&id))
    }

    /// Applies the completion of an add fetch. Completions whose ticket is no
    /// longer pending are dropped so a removed asset is never resurrected.
    pub fn complete_fetch(
        &mut self,
        id: &str,
        ticket: FetchTicket,
        result: Result<AssetDetail, FetchError>,
    ) -> FetchOutcome {
        let id = canonical_id(id);
        if !self.market.settle_fetch(&id, ticket) {
            return FetchOutcome::Stale;
        }

        let asset = result.and_then(|detail| TrackedAsset::from_detail(&detail, self.sparkline_points));
        match asset {
            Ok(mut asset) => {
                asset.id = id;
                self.market.upsert(asset, ticket);
                FetchOutcome::Inserted
            }
            Err(err) => FetchOutcome::Failed(err),
        }
    }

    pub fn remove_asset(&mut self, id: &str) -> bool {
        self.market.remove(&canonical_id(id))
    }

    /// Tracked assets a periodic refresh should ask for, with the add each
    /// one belongs to.
    pub fn refresh_targets(&self) -> Vec<(String, FetchTicket)> {
        self.market.generations()
    }

    /// Periodic refresh. Replaces each returned asset that is still tracked
    /// under the add it was requested for; everything else is discarded.
    pub fn apply_refresh(
        &mut self,
        requested: &[(String, FetchTicket)],
        details: Vec<AssetDetail>,
    ) -> RefreshSummary {
        let mut summary = RefreshSummary::default();
        let mut seen = HashSet::new();

        for detail in &details {
            let id = canonical_id(&detail.id);
            let Some((_, ticket)) = requested.iter().find(|(wanted, _)| *wanted == id) else {
                continue;
            };
            seen.insert(id.clone());

            match TrackedAsset::from_detail(detail, self.sparkline_points) {
                Ok(mut asset) => {
                    asset.id = id.clone();
                    if self.market.replace_if_tracked(asset, *ticket) {
                        summary.replaced += 1;
                    } else {
                        summary.stale.push(id);
                    }
                }
                Err(err) => summary.rejected.push((id, err)),
            }
        }

        summary.missing = requested
            .iter()
            .filter(|(id, _)| !seen.contains(id) && self.market.is_tracked(id))
            .map(|(id, _)| id.clone())
            .collect();
        summary
    }

    /// Overlays every streamed price, then consumes the alerts the batch
    /// crossed. Each alert fires at most once.
    pub fn apply_stream_update(&mut self, batch: &PriceBatch) -> Vec<FiredAlert> {
        let mut ids = Vec::with_capacity(batch.len());
        for (id, price) in batch {
            let id = canonical_id(id);
            self.market.overlay_price(&id, *price);
            ids.push(id);
        }

        ids.iter()
            .filter_map(|id| {
                let price = self.market.overlay(id)?;
                self.alerts.check(id, price)
            })
            .collect()
    }

    pub fn set_alert(&mut self, id: &str, target: f64) -> Result<Option<f64>, InputError> {
        let id = normalize_id(id)?;
        self.alerts.set(&id, target)
    }

    pub fn clear_alert(&mut self, id: &str) -> Option<f64> {
        self.alerts.clear(&canonical_id(id))
    }

    pub fn adjust_portfolio(&mut self, id: &str, delta: Decimal) -> Result<Decimal, InputError> {
        let id = normalize_id(id)?;
        self.portfolio.adjust(&id, delta)
    }

    /// Replaces the trending list in one step.
    pub fn refresh_trending(&mut self, mut fetched: Vec<TrendingAsset>) {
        fetched.truncate(TRENDING_LIMIT);
        self.trending = fetched;
    }

    pub fn derived_display_price(&self, id: &str) -> Option<f64> {
        self.market.display_price(&canonical_id(id))
    }

    pub fn set_feed_filter(&mut self, filter: FeedFilter) {
        self.feed.set_filter(filter);
    }

    pub fn add_feed_source(&mut self, source: &str) -> Result<bool, InputError> {
        self.feed.add_source(source)
    }

    pub fn is_tracked(&self, id: &str) -> bool {
        self.market.is_tracked(&canonical_id(id))
    }

    #[cfg(test)]
    pub fn alert_target(&self, id: &str) -> Option<f64> {
        self.alerts.get(&canonical_id(id))
    }

    #[cfg(test)]
    pub fn holding(&self, id: &str) -> Decimal {
        self.portfolio.quantity(&canonical_id(id))
    }

    #[cfg(test)]
    pub fn trending(&self) -> &[TrendingAsset] {
        &self.trending
    }

    pub fn view(&self) -> DashboardView {
        view::build(&self.market, &self.alerts, &self.portfolio, &self.trending, &self.feed)
    }
}

/// Trimmed, lowercased asset id. Lookups use it as is; operations that
/// create state go through [`normalize_id`] instead.
fn canonical_id(id: &str) -> String {
    id.trim().to_lowercase()
}

pub fn normalize_id(id: &str) -> Result<String, InputError> {
    let id = canonical_id(id);
    if id.is_empty() {
        return Err(InputError::EmptyAssetId);
    }
    Ok(id)
}
