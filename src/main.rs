mod commands;
mod config;
mod error;
mod market_data;
mod metrics;
mod notify;
mod state;

use std::sync::Arc;
use std::time::Duration;

pub use anyhow::Result;
use tokio::sync::{mpsc, watch};
pub use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::commands::Command;
use crate::config::Config;
use crate::market_data::adapters::{coincap, coingecko::CoinGeckoClient};
use crate::market_data::router::Router;
use crate::market_data::scheduler::RefreshTimers;
use crate::market_data::types::HubEvent;
use crate::metrics::prometheus;
use crate::notify::ConsoleNotifier;
use crate::state::hub::HubState;
use crate::state::view::DashboardView;

/// Router event channel buffer.
/// Sized to absorb stream bursts without back-pressuring the adapters.
const EVENT_CHANNEL_BUFFER: usize = 1_024;

/// How long teardown waits for in-flight fetches before giving up.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config.log_level);

    if let Some(port) = config.metrics_port {
        prometheus::init_metrics_server(port)?;
        info!(port, "metrics exporter listening");
    }

    info!(
        api = %config.api_url,
        stream = %config.stream_url,
        default_assets = ?config.default_assets,
        "crypto-hub starting"
    );

    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_BUFFER);
    let (view_tx, view_rx) = watch::channel(DashboardView::default());

    let source = Arc::new(CoinGeckoClient::new(config.api_url.clone(), config.http_timeout)?);
    let router = Router::new(
        HubState::new(config.sparkline_points),
        source,
        Arc::new(ConsoleNotifier::new()),
        &tx,
        view_tx,
    );
    let router_handle = tokio::spawn(router.run(rx));

    for id in &config.default_assets {
        tx.send(HubEvent::Command {
            command: Command::Add(id.clone()),
            reply: None,
        })
        .await?;
    }

    let mut timers = RefreshTimers::start(tx.clone(), config.refresh_interval, config.trending_interval);
    let mut stream_handle = tokio::spawn(coincap::run_price_stream(
        config.stream_url.clone(),
        config.stream_assets.clone(),
        tx.clone(),
    ));
    let mut commands_handle = tokio::spawn(commands::run_command_loop(
        commands::spawn_stdin_reader(),
        tx,
        view_rx,
    ));

    tokio::select! {
        res = &mut commands_handle => {
            match res {
                Ok(Ok(())) => info!("command loop exited"),
                Ok(Err(err)) => warn!(error = %err, "command loop returned error"),
                Err(err) => warn!(error = %err, "command loop task panicked"),
            }
        }
        res = &mut stream_handle => {
            match res {
                Ok(Ok(())) => warn!("price stream exited"),
                Ok(Err(err)) => warn!(error = %err, "price stream returned error"),
                Err(err) => warn!(error = %err, "price stream task panicked"),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received Ctrl-C, shutting down");
        }
    }

    // Every sender is dropped here, which lets the router drain and exit.
    timers.shutdown();
    stream_handle.abort();
    commands_handle.abort();

    match tokio::time::timeout(SHUTDOWN_GRACE, router_handle).await {
        Ok(Ok(Ok(()))) => info!("router stopped"),
        Ok(Ok(Err(err))) => warn!(error = %err, "router returned error"),
        Ok(Err(err)) => warn!(error = %err, "router task panicked"),
        Err(_) => warn!("router did not stop in time, in-flight fetches abandoned"),
    }

    Ok(())
}
