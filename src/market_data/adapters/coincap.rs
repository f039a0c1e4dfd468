use futures::StreamExt;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::error::StreamError;
use crate::market_data::types::{HubEvent, PriceBatch};
use crate::metrics::prometheus;

const RECONNECT_BASE_DELAY: Duration = Duration::from_secs(1);
const RECONNECT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Subscribes to the CoinCap price stream for a fixed asset set and forwards
/// every well-formed batch to the router. Reconnects until the router's
/// channel closes.
pub async fn run_price_stream(
    base_url: String,
    assets: Vec<String>,
    tx: mpsc::Sender<HubEvent>,
) -> anyhow::Result<()> {
    if assets.is_empty() {
        warn!("no stream assets configured, price stream disabled");
        return Ok(());
    }

    let endpoint = stream_endpoint(&base_url, &assets);
    let mut attempt: u32 = 0;

    loop {
        match connect_async(endpoint.as_str()).await {
            Ok((mut ws, _)) => {
                info!(%endpoint, assets = assets.len(), "price stream connected");
                attempt = 0;

                while let Some(msg) = ws.next().await {
                    match msg {
                        Ok(Message::Text(text)) => match parse_price_batch(&text) {
                            Ok(batch) if batch.is_empty() => {}
                            Ok(batch) => {
                                prometheus::record_stream_batch(batch.len());
                                if tx.send(HubEvent::Prices(batch)).await.is_err() {
                                    info!("event channel closed, price stream stopping");
                                    return Ok(());
                                }
                            }
                            Err(err) => {
                                prometheus::record_malformed_payload();
                                warn!(error = %err, "dropping price payload");
                            }
                        },
                        Ok(Message::Close(frame)) => {
                            info!(?frame, "price stream closed by server");
                            break;
                        }
                        Ok(other) => debug!(?other, "ignoring non-text frame"),
                        Err(err) => {
                            warn!(error = %StreamError::from(err), "price stream read failed");
                            break;
                        }
                    }
                }
            }
            Err(err) => {
                warn!(error = %StreamError::from(err), %endpoint, "price stream connect failed");
            }
        }

        if tx.is_closed() {
            return Ok(());
        }

        let delay = reconnect_delay(attempt);
        attempt = attempt.saturating_add(1);
        warn!(attempt, delay_ms = delay.as_millis() as u64, "reconnecting price stream");
        sleep(delay).await;
    }
}

pub fn stream_endpoint(base_url: &str, assets: &[String]) -> String {
    format!("{}?assets={}", base_url, assets.join(","))
}

/// Exponential backoff from one second, capped at thirty.
pub fn reconnect_delay(attempt: u32) -> Duration {
    let factor = 1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
    RECONNECT_BASE_DELAY
        .saturating_mul(factor)
        .min(RECONNECT_MAX_DELAY)
}

/// Parses one `{"bitcoin": "51000.12", ...}` frame. Prices may be strings or
/// numbers; one bad entry rejects the whole frame.
pub fn parse_price_batch(text: &str) -> Result<PriceBatch, StreamError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| StreamError::Malformed(e.to_string()))?;

    let map = match value {
        Value::Object(map) => map,
        other => {
            return Err(StreamError::Malformed(format!("expected an object, got {other}")));
        }
    };

    let mut batch = PriceBatch::with_capacity(map.len());
    for (asset, raw) in map {
        let price = match &raw {
            Value::String(s) => s.trim().parse::<f64>().ok(),
            Value::Number(n) => n.as_f64(),
            _ => None,
        };
        match price {
            Some(p) if p.is_finite() && p >= 0.0 => {
                batch.insert(asset, p);
            }
            _ => {
                return Err(StreamError::Malformed(format!("bad price for {asset}: {raw}")));
            }
        }
    }

    Ok(batch)
}
