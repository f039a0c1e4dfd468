use async_trait::async_trait;
use tracing::info;

use super::traits::AlertNotifier;
use crate::state::alerts::FiredAlert;

/// Logs fired alerts.
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AlertNotifier for ConsoleNotifier {
    async fn alert_fired(&self, alert: &FiredAlert) {
        info!(
            asset = %alert.asset_id,
            target = alert.target,
            price = alert.price,
            fired_at = %alert.fired_at.format("%Y-%m-%d %H:%M:%S"),
            "PRICE ALERT"
        );
    }
}
