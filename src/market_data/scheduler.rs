use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

use crate::market_data::types::HubEvent;

/// Periodic asset and trending refresh ticks. Both tickers are aborted on
/// `shutdown` or drop, so nothing fires after the dashboard is torn down.
pub struct RefreshTimers {
    handles: Vec<JoinHandle<()>>,
}

impl RefreshTimers {
    /// Trending ticks immediately, asset refresh waits one full period since
    /// freshly added assets were just fetched.
    pub fn start(tx: mpsc::Sender<HubEvent>, refresh_every: Duration, trending_every: Duration) -> Self {
        let handles = vec![
            tokio::spawn(run_ticker(tx.clone(), refresh_every, false, || HubEvent::RefreshDue)),
            tokio::spawn(run_ticker(tx, trending_every, true, || HubEvent::TrendingDue)),
        ];
        Self { handles }
    }

    pub fn shutdown(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for RefreshTimers {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_ticker(
    tx: mpsc::Sender<HubEvent>,
    period: Duration,
    immediate: bool,
    event: fn() -> HubEvent,
) {
    let start = if immediate { Instant::now() } else { Instant::now() + period };
    let mut interval = time::interval_at(start, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        if tx.send(event()).await.is_err() {
            debug!("event channel closed, ticker stopping");
            return;
        }
    }
}
