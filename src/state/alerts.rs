use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::error::InputError;

/// An alert that crossed its target and has been consumed.
#[derive(Clone, Debug, PartialEq)]
pub struct FiredAlert {
    pub asset_id: String,
    pub target: f64,
    pub price: f64,
    pub fired_at: DateTime<Utc>,
}

/// One active target price per asset. A fired alert is deleted, so it can
/// never fire twice.
#[derive(Clone, Debug, Default)]
pub struct AlertBook {
    targets: HashMap<String, f64>,
}

impl AlertBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites any existing alert for `asset_id`.
    pub fn set(&mut self, asset_id: &str, target: f64) -> Result<Option<f64>, InputError> {
        validate_target(target)?;
        Ok(self.targets.insert(asset_id.to_string(), target))
    }

    pub fn clear(&mut self, asset_id: &str) -> Option<f64> {
        self.targets.remove(asset_id)
    }

    #[cfg(test)]
    pub fn get(&self, asset_id: &str) -> Option<f64> {
        self.targets.get(asset_id).copied()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Consumes the alert for `asset_id` if `price` reached its target.
    pub fn check(&mut self, asset_id: &str, price: f64) -> Option<FiredAlert> {
        let target = *self.targets.get(asset_id)?;
        if price < target {
            return None;
        }
        self.targets.remove(asset_id);
        Some(FiredAlert {
            asset_id: asset_id.to_string(),
            target,
            price,
            fired_at: Utc::now(),
        })
    }

    /// Active alerts sorted by asset id.
    pub fn active(&self) -> Vec<(String, f64)> {
        let mut out: Vec<(String, f64)> = self
            .targets
            .iter()
            .map(|(id, target)| (id.clone(), *target))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}

pub fn validate_target(target: f64) -> Result<(), InputError> {
    if target.is_finite() && target >= 0.0 {
        Ok(())
    } else {
        Err(InputError::InvalidAlertPrice(target.to_string()))
    }
}
