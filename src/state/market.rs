use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::FetchError;
use crate::market_data::types::{AssetDetail, TrendingItem};

/// Latest REST snapshot of an asset on the dashboard.
/// Replaced wholesale on every refresh, never patched field by field.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrackedAsset {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub image: String,
    pub last_price: f64,
    pub change_24h: Option<f64>,
    pub sparkline: Vec<f64>,
    pub updated_at: DateTime<Utc>,
}

impl TrackedAsset {
    /// Converts a REST row, rejecting rows that carry no usable price.
    pub fn from_detail(detail: &AssetDetail, sparkline_points: usize) -> Result<Self, FetchError> {
        let last_price = match detail.current_price {
            Some(p) if p.is_finite() && p >= 0.0 => p,
            other => {
                return Err(FetchError::Decode(format!(
                    "{} has no usable price ({other:?})",
                    detail.id
                )));
            }
        };

        Ok(Self {
            id: detail.id.clone(),
            name: detail.name.clone(),
            symbol: detail.symbol.to_uppercase(),
            image: detail.image.clone().unwrap_or_default(),
            last_price,
            change_24h: detail.price_change_percentage_24h,
            sparkline: downsample(detail.sparkline(), sparkline_points),
            updated_at: Utc::now(),
        })
    }
}

/// Read-only trending row. Lives in its own list with its own lifecycle.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrendingAsset {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub change_24h: Option<f64>,
    pub thumb: String,
}

impl From<&TrendingItem> for TrendingAsset {
    fn from(item: &TrendingItem) -> Self {
        Self {
            id: item.id.clone(),
            name: item.name.clone(),
            symbol: item.symbol.to_uppercase(),
            change_24h: item.change_24h_usd(),
            thumb: item.thumb.clone(),
        }
    }
}

/// Picks `points` evenly spaced samples, always keeping the first and last.
/// Series shorter than `points` are returned as is.
pub fn downsample(series: &[f64], points: usize) -> Vec<f64> {
    if points == 0 {
        return Vec::new();
    }
    if series.len() <= points {
        return series.to_vec();
    }
    if points == 1 {
        return vec![series[series.len() - 1]];
    }

    let last = series.len() - 1;
    (0..points)
        .map(|i| series[i * last / (points - 1)])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::types::SparklineIn7d;

    fn detail(price: Option<f64>, spark: Vec<f64>) -> AssetDetail {
        AssetDetail {
            id: "bitcoin".into(),
            symbol: "btc".into(),
            name: "Bitcoin".into(),
            image: Some("https://img/btc.png".into()),
            current_price: price,
            price_change_percentage_24h: Some(2.5),
            sparkline_in_7d: Some(SparklineIn7d { price: spark }),
        }
    }

    #[test]
    fn downsample_keeps_endpoints() {
        let series: Vec<f64> = (0..168).map(|i| i as f64).collect();
        let out = downsample(&series, 7);

        assert_eq!(out.len(), 7);
        assert_eq!(out[0], 0.0);
        assert_eq!(out[6], 167.0);
        assert!(out.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn downsample_short_series_untouched() {
        assert_eq!(downsample(&[1.0, 2.0], 7), vec![1.0, 2.0]);
        assert_eq!(downsample(&[1.0, 2.0, 3.0], 1), vec![3.0]);
        assert!(downsample(&[1.0], 0).is_empty());
    }

    #[test]
    fn from_detail_uppercases_symbol_and_trims_sparkline() {
        let spark: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let asset = TrackedAsset::from_detail(&detail(Some(50_000.0), spark), 5).unwrap();

        assert_eq!(asset.symbol, "BTC");
        assert_eq!(asset.last_price, 50_000.0);
        assert_eq!(asset.sparkline.len(), 5);
    }

    #[test]
    fn from_detail_rejects_missing_or_bad_price() {
        assert!(TrackedAsset::from_detail(&detail(None, vec![]), 7).is_err());
        assert!(TrackedAsset::from_detail(&detail(Some(f64::NAN), vec![]), 7).is_err());
        assert!(TrackedAsset::from_detail(&detail(Some(-1.0), vec![]), 7).is_err());
    }
}
