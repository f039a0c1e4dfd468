use async_trait::async_trait;

use crate::state::alerts::FiredAlert;

/// Delivers one-time price alert notifications to the user.
#[async_trait]
pub trait AlertNotifier: Send + Sync {
    async fn alert_fired(&self, alert: &FiredAlert);
}
