use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::commands::{Command, CommandReply, HELP};
use crate::market_data::traits::MarketDataSource;
use crate::market_data::types::HubEvent;
use crate::metrics::prometheus;
use crate::notify::AlertNotifier;
use crate::state::hub::{FetchOutcome, HubState};
use crate::state::market_cache::FetchTicket;
use crate::state::portfolio::valuation;
use crate::state::view::DashboardView;

/// Sole owner of the dashboard state. Applies one event at a time, runs the
/// resulting side effects and publishes a fresh view after each event.
pub struct Router {
    state: HubState,
    source: Arc<dyn MarketDataSource>,
    notifier: Arc<dyn AlertNotifier>,
    // Weak so the router never keeps its own channel open.
    events: mpsc::WeakSender<HubEvent>,
    view_tx: watch::Sender<DashboardView>,
}

impl Router {
    pub fn new(
        state: HubState,
        source: Arc<dyn MarketDataSource>,
        notifier: Arc<dyn AlertNotifier>,
        events: &mpsc::Sender<HubEvent>,
        view_tx: watch::Sender<DashboardView>,
    ) -> Self {
        Self {
            state,
            source,
            notifier,
            events: events.downgrade(),
            view_tx,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> &HubState {
        &self.state
    }

    /// Runs until every sender of the event channel is gone.
    pub async fn run(mut self, mut rx: mpsc::Receiver<HubEvent>) -> anyhow::Result<()> {
        info!("router started");
        self.publish();

        while let Some(event) = rx.recv().await {
            self.handle(event).await;
        }

        info!("event channel closed, router shutting down");
        Ok(())
    }

    pub async fn handle(&mut self, event: HubEvent) {
        match event {
            HubEvent::Command { command, reply } => {
                let outcome = self.apply_command(command);
                if let Some(reply) = reply {
                    let _ = reply.send(outcome);
                } else if let Err(err) = outcome {
                    warn!(error = %err, "command rejected");
                }
            }
            HubEvent::AssetFetched {
                asset_id,
                ticket,
                result,
            } => match self.state.complete_fetch(&asset_id, ticket, result) {
                FetchOutcome::Inserted => info!(asset = %asset_id, "asset added"),
                FetchOutcome::Stale => {
                    prometheus::record_stale_fetch();
                    debug!(asset = %asset_id, ?ticket, "discarding fetch for removed asset");
                }
                FetchOutcome::Failed(err) => {
                    prometheus::record_fetch_failure("asset");
                    warn!(asset = %asset_id, error = %err, "asset fetch failed");
                }
            },
            HubEvent::RefreshDue => self.spawn_refresh(),
            HubEvent::RefreshFetched {
                requested,
                result: Ok(details),
            } => {
                let summary = self.state.apply_refresh(&requested, details);
                for (asset, err) in &summary.rejected {
                    prometheus::record_fetch_failure("refresh");
                    warn!(asset = %asset, error = %err, "refresh row rejected, keeping previous data");
                }
                if !summary.missing.is_empty() {
                    warn!(missing = ?summary.missing, "refresh response left out tracked assets");
                }
                for asset in &summary.stale {
                    prometheus::record_stale_fetch();
                    debug!(asset = %asset, "discarding refresh for removed or re-added asset");
                }
                debug!(replaced = summary.replaced, "tracked assets refreshed");
            }
            HubEvent::RefreshFetched { result: Err(err), .. } => {
                prometheus::record_fetch_failure("refresh");
                warn!(error = %err, "asset refresh failed, keeping previous data");
            }
            HubEvent::TrendingDue => self.spawn_trending(),
            HubEvent::TrendingFetched(Ok(trending)) => {
                debug!(count = trending.len(), "trending list replaced");
                self.state.refresh_trending(trending);
            }
            HubEvent::TrendingFetched(Err(err)) => {
                prometheus::record_fetch_failure("trending");
                warn!(error = %err, "trending fetch failed, keeping previous list");
            }
            HubEvent::Prices(batch) => {
                let fired = self.state.apply_stream_update(&batch);
                for alert in &fired {
                    prometheus::record_alert_fired(&alert.asset_id);
                    self.notifier.alert_fired(alert).await;
                }
            }
        }

        self.publish();
    }

    fn apply_command(&mut self, command: Command) -> CommandReply {
        match command {
            Command::Add(id) => match self.state.add_asset(&id)? {
                Some(ticket) => {
                    self.spawn_fetch(id.clone(), ticket);
                    Ok(format!("fetching {id}"))
                }
                None if self.state.is_tracked(&id) => Ok(format!("{id} is already tracked")),
                None => Ok(format!("{id} is already being fetched")),
            },
            Command::Remove(id) => {
                if self.state.remove_asset(&id) {
                    Ok(format!("removed {id}"))
                } else {
                    Ok(format!("{id} is not tracked"))
                }
            }
            Command::Alert { asset_id, target } => {
                let previous = self.state.set_alert(&asset_id, target)?;
                Ok(match previous {
                    Some(old) => format!("alert for {asset_id} moved from {old} to {target}"),
                    None => format!("alert set: {asset_id} >= {target}"),
                })
            }
            Command::Unalert(id) => Ok(match self.state.clear_alert(&id) {
                Some(_) => format!("alert for {id} cleared"),
                None => format!("no alert for {id}"),
            }),
            Command::Hold { asset_id, delta } => {
                let quantity = self.state.adjust_portfolio(&asset_id, delta)?;
                let price = self.state.derived_display_price(&asset_id);
                Ok(match valuation(quantity, price) {
                    Some(value) => format!("holding {quantity} {asset_id} (${value:.2})"),
                    None => format!("holding {quantity} {asset_id}"),
                })
            }
            Command::Feed(filter) => {
                self.state.set_feed_filter(filter);
                Ok(format!("feed filter: {filter}"))
            }
            Command::Source(source) => Ok(if self.state.add_feed_source(&source)? {
                format!("added feed source {}", source.trim())
            } else {
                format!("already following {}", source.trim())
            }),
            Command::Show | Command::Help | Command::Quit => Ok(HELP.to_string()),
        }
    }

    fn publish(&self) {
        self.view_tx.send_replace(self.state.view());
    }

    fn spawn_fetch(&self, asset_id: String, ticket: FetchTicket) {
        let Some(tx) = self.events.upgrade() else {
            return;
        };
        let source = Arc::clone(&self.source);

        tokio::spawn(async move {
            let result = source.fetch_asset(&asset_id).await;
            let _ = tx
                .send(HubEvent::AssetFetched {
                    asset_id,
                    ticket,
                    result,
                })
                .await;
        });
    }

    fn spawn_refresh(&self) {
        let requested = self.state.refresh_targets();
        if requested.is_empty() {
            return;
        }
        let Some(tx) = self.events.upgrade() else {
            return;
        };
        let source = Arc::clone(&self.source);

        tokio::spawn(async move {
            let ids: Vec<String> = requested.iter().map(|(id, _)| id.clone()).collect();
            let result = source.fetch_assets(&ids).await;
            let _ = tx.send(HubEvent::RefreshFetched { requested, result }).await;
        });
    }

    fn spawn_trending(&self) {
        let Some(tx) = self.events.upgrade() else {
            return;
        };
        let source = Arc::clone(&self.source);

        tokio::spawn(async move {
            let result = source.fetch_trending().await;
            let _ = tx.send(HubEvent::TrendingFetched(result)).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::submit;
    use crate::error::{FetchError, InputError};
    use crate::market_data::types::{AssetDetail, PriceBatch};
    use crate::state::alerts::FiredAlert;
    use crate::state::hub::tests::detail;
    use crate::state::market::TrendingAsset;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct MockSource {
        prices: Mutex<HashMap<String, f64>>,
        trending_fails: AtomicBool,
    }

    impl MockSource {
        fn with(prices: &[(&str, f64)]) -> Arc<Self> {
            let source = Self::default();
            *source.prices.lock().unwrap() =
                prices.iter().map(|(id, p)| (id.to_string(), *p)).collect();
            Arc::new(source)
        }

        fn set_price(&self, id: &str, price: f64) {
            self.prices.lock().unwrap().insert(id.to_string(), price);
        }
    }

    #[async_trait]
    impl MarketDataSource for MockSource {
        async fn fetch_asset(&self, id: &str) -> Result<AssetDetail, FetchError> {
            let price = self.prices.lock().unwrap().get(id).copied();
            price
                .map(|p| detail(id, p))
                .ok_or_else(|| FetchError::NotFound(id.to_string()))
        }

        async fn fetch_assets(&self, ids: &[String]) -> Result<Vec<AssetDetail>, FetchError> {
            let prices = self.prices.lock().unwrap();
            Ok(ids
                .iter()
                .filter_map(|id| prices.get(id).map(|p| detail(id, *p)))
                .collect())
        }

        async fn fetch_trending(&self) -> Result<Vec<TrendingAsset>, FetchError> {
            if self.trending_fails.load(Ordering::SeqCst) {
                return Err(FetchError::Status {
                    status: 503,
                    body: "unavailable".into(),
                });
            }
            Ok(["solana", "polkadot", "avalanche-2", "pepe"]
                .iter()
                .map(|id| TrendingAsset {
                    id: id.to_string(),
                    name: id.to_string(),
                    symbol: id[..3].to_uppercase(),
                    change_24h: Some(5.0),
                    thumb: String::new(),
                })
                .collect())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        fired: Mutex<Vec<FiredAlert>>,
    }

    #[async_trait]
    impl AlertNotifier for RecordingNotifier {
        async fn alert_fired(&self, alert: &FiredAlert) {
            self.fired.lock().unwrap().push(alert.clone());
        }
    }

    struct Harness {
        router: Router,
        tx: mpsc::Sender<HubEvent>,
        rx: mpsc::Receiver<HubEvent>,
        notifier: Arc<RecordingNotifier>,
        view_rx: watch::Receiver<DashboardView>,
    }

    impl Harness {
        fn new(source: Arc<MockSource>) -> Self {
            let (tx, rx) = mpsc::channel(64);
            let (view_tx, view_rx) = watch::channel(DashboardView::default());
            let notifier = Arc::new(RecordingNotifier::default());
            let router = Router::new(HubState::new(7), source, notifier.clone(), &tx, view_tx);
            Self {
                router,
                tx,
                rx,
                notifier,
                view_rx,
            }
        }

        async fn command(&mut self, command: Command) -> CommandReply {
            let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
            self.router
                .handle(HubEvent::Command {
                    command,
                    reply: Some(reply_tx),
                })
                .await;
            reply_rx.await.unwrap()
        }

        /// Applies the next event the spawned tasks produced.
        async fn pump(&mut self) {
            let event = self.rx.recv().await.unwrap();
            self.router.handle(event).await;
        }

        async fn prices(&mut self, pairs: &[(&str, f64)]) {
            let batch: PriceBatch = pairs.iter().map(|(id, p)| (id.to_string(), *p)).collect();
            self.router.handle(HubEvent::Prices(batch)).await;
        }

        fn fired(&self) -> Vec<FiredAlert> {
            self.notifier.fired.lock().unwrap().clone()
        }
    }

    #[tokio::test]
    async fn add_fetch_then_stream_overrides_price() {
        let mut h = Harness::new(MockSource::with(&[("bitcoin", 50_000.0)]));

        assert_eq!(h.command(Command::Add("bitcoin".into())).await.unwrap(), "fetching bitcoin");
        h.pump().await;
        assert_eq!(h.router.state().derived_display_price("bitcoin"), Some(50_000.0));

        h.prices(&[("bitcoin", 51_000.0)]).await;
        assert_eq!(h.router.state().derived_display_price("bitcoin"), Some(51_000.0));

        let view = h.view_rx.borrow().clone();
        assert_eq!(view.assets.len(), 1);
        assert!(view.assets[0].live);
    }

    #[tokio::test]
    async fn duplicate_add_does_not_fetch_twice() {
        let mut h = Harness::new(MockSource::with(&[("bitcoin", 50_000.0)]));

        h.command(Command::Add("bitcoin".into())).await.unwrap();
        let reply = h.command(Command::Add("bitcoin".into())).await.unwrap();
        assert_eq!(reply, "bitcoin is already being fetched");

        h.pump().await;
        let reply = h.command(Command::Add("bitcoin".into())).await.unwrap();
        assert_eq!(reply, "bitcoin is already tracked");
        assert!(h.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn removal_wins_over_late_fetch() {
        let mut h = Harness::new(MockSource::with(&[("bitcoin", 50_000.0)]));

        h.command(Command::Add("bitcoin".into())).await.unwrap();
        h.command(Command::Remove("bitcoin".into())).await.unwrap();
        h.pump().await;

        assert!(!h.router.state().is_tracked("bitcoin"));
        assert!(h.view_rx.borrow().assets.is_empty());
    }

    #[tokio::test]
    async fn failed_fetch_leaves_state_unchanged() {
        let mut h = Harness::new(MockSource::with(&[]));

        h.command(Command::Add("nope".into())).await.unwrap();
        h.pump().await;

        assert!(!h.router.state().is_tracked("nope"));
        assert_eq!(h.router.state().derived_display_price("nope"), None);
    }

    #[tokio::test]
    async fn alert_notifies_exactly_once() {
        let mut h = Harness::new(MockSource::with(&[]));

        h.command(Command::Alert {
            asset_id: "bitcoin".into(),
            target: 52_000.0,
        })
        .await
        .unwrap();

        h.prices(&[("bitcoin", 52_500.0)]).await;
        h.prices(&[("bitcoin", 53_000.0)]).await;

        let fired = h.fired();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].price, 52_500.0);
        assert!(h.view_rx.borrow().alerts.is_empty());
    }

    #[tokio::test]
    async fn refresh_replaces_prices_of_tracked_assets() {
        let source = MockSource::with(&[("bitcoin", 50_000.0)]);
        let mut h = Harness::new(source.clone());

        h.command(Command::Add("bitcoin".into())).await.unwrap();
        h.pump().await;

        source.set_price("bitcoin", 48_000.0);
        h.router.handle(HubEvent::RefreshDue).await;
        h.pump().await;

        assert_eq!(h.router.state().derived_display_price("bitcoin"), Some(48_000.0));
    }

    #[tokio::test]
    async fn refresh_requested_before_re_add_does_not_overwrite_newer_data() {
        let source = MockSource::with(&[("bitcoin", 50_000.0)]);
        let mut h = Harness::new(source.clone());

        h.command(Command::Add("bitcoin".into())).await.unwrap();
        h.pump().await;
        let requested = h.router.state().refresh_targets();

        h.command(Command::Remove("bitcoin".into())).await.unwrap();
        source.set_price("bitcoin", 60_000.0);
        h.command(Command::Add("bitcoin".into())).await.unwrap();
        h.pump().await;

        h.router
            .handle(HubEvent::RefreshFetched {
                requested,
                result: Ok(vec![detail("bitcoin", 50_000.0)]),
            })
            .await;

        assert_eq!(h.router.state().derived_display_price("bitcoin"), Some(60_000.0));
    }

    #[tokio::test]
    async fn refresh_row_without_price_keeps_previous_snapshot() {
        let source = MockSource::with(&[("bitcoin", 50_000.0)]);
        let mut h = Harness::new(source.clone());

        h.command(Command::Add("bitcoin".into())).await.unwrap();
        h.pump().await;

        let mut row = detail("bitcoin", 0.0);
        row.current_price = None;
        let requested = h.router.state().refresh_targets();
        h.router
            .handle(HubEvent::RefreshFetched {
                requested,
                result: Ok(vec![row]),
            })
            .await;

        assert_eq!(h.router.state().derived_display_price("bitcoin"), Some(50_000.0));
        assert_eq!(h.view_rx.borrow().assets.len(), 1);
    }

    #[tokio::test]
    async fn trending_failure_keeps_previous_list() {
        let source = MockSource::with(&[]);
        let mut h = Harness::new(source.clone());

        h.router.handle(HubEvent::TrendingDue).await;
        h.pump().await;
        assert_eq!(h.router.state().trending().len(), 3);

        source.trending_fails.store(true, Ordering::SeqCst);
        h.router.handle(HubEvent::TrendingDue).await;
        h.pump().await;
        assert_eq!(h.router.state().trending().len(), 3);
    }

    #[tokio::test]
    async fn negative_holding_is_reported_inline() {
        let mut h = Harness::new(MockSource::with(&[]));

        let reply = h
            .command(Command::Hold {
                asset_id: "bitcoin".into(),
                delta: Decimal::ONE,
            })
            .await;
        assert_eq!(reply.unwrap(), "holding 1 bitcoin");

        let reply = h
            .command(Command::Hold {
                asset_id: "bitcoin".into(),
                delta: Decimal::from(-2),
            })
            .await;
        assert!(matches!(reply, Err(InputError::NegativeQuantity { .. })));
        assert_eq!(h.router.state().holding("bitcoin"), Decimal::ONE);

        h.prices(&[("bitcoin", 20_000.0)]).await;
        let reply = h
            .command(Command::Hold {
                asset_id: "bitcoin".into(),
                delta: Decimal::ONE,
            })
            .await;
        assert_eq!(reply.unwrap(), "holding 2 bitcoin ($40000.00)");
    }

    #[tokio::test]
    async fn run_loop_serves_commands_and_exits_when_senders_drop() {
        let source = MockSource::with(&[("ethereum", 3_000.0)]);
        let Harness {
            router,
            tx,
            rx,
            mut view_rx,
            ..
        } = Harness::new(source);
        let handle = tokio::spawn(router.run(rx));

        let reply = submit(&tx, Command::Add("ethereum".into())).await.unwrap();
        assert_eq!(reply.unwrap(), "fetching ethereum");

        view_rx
            .wait_for(|view| view.assets.iter().any(|a| a.id == "ethereum"))
            .await
            .unwrap();

        drop(tx);
        handle.await.unwrap().unwrap();
    }
}
