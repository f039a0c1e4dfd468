use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus HTTP exporter on the given port.
/// After this call, any metrics recorded via the `metrics` crate
/// macros (counter!, histogram!) are automatically exported at /metrics.
pub fn init_metrics_server(port: u16) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()?;
    Ok(())
}

// ── Stream metrics ───────────────────────────────────────────────

pub fn record_stream_batch(prices: usize) {
    counter!("stream_batches_total").increment(1);
    histogram!("stream_batch_prices").record(prices as f64);
}

pub fn record_malformed_payload() {
    counter!("stream_malformed_payloads_total").increment(1);
}

// ── Fetch metrics ────────────────────────────────────────────────

pub fn record_fetch_failure(operation: &str) {
    counter!("fetch_failures_total", "operation" => operation.to_string()).increment(1);
}

/// A fetch completed after its asset was removed or re-added.
pub fn record_stale_fetch() {
    counter!("fetch_stale_completions_total").increment(1);
}

// ── User-facing metrics ──────────────────────────────────────────

pub fn record_alert_fired(asset_id: &str) {
    counter!("alerts_fired_total", "asset" => asset_id.to_string()).increment(1);
}

pub fn record_input_rejected(kind: &str) {
    counter!("input_rejected_total", "kind" => kind.to_string()).increment(1);
}
