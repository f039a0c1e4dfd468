use anyhow::Context;
use std::time::Duration;

const DEFAULT_API_URL: &str = "https://api.coingecko.com/api/v3";
const DEFAULT_STREAM_URL: &str = "wss://ws.coincap.io/prices";
const DEFAULT_ASSETS: &str = "bitcoin,ethereum,cardano";

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub api_url: String,
    pub stream_url: String,
    /// Assets tracked at startup.
    pub default_assets: Vec<String>,
    /// Fixed asset set the price stream subscribes to.
    pub stream_assets: Vec<String>,
    pub refresh_interval: Duration,
    pub trending_interval: Duration,
    pub http_timeout: Duration,
    pub sparkline_points: usize,
    /// Prometheus exporter port; `None` disables the exporter.
    pub metrics_port: Option<u16>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        // dotenvy loads .env, but doesn't override already-set env vars
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup, so it can be exercised without
    /// touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let log_level = get("RUST_LOG", "info");
        let api_url = get("COINGECKO_API_URL", DEFAULT_API_URL)
            .trim_end_matches('/')
            .to_string();
        let stream_url = get("PRICE_STREAM_URL", DEFAULT_STREAM_URL);
        let default_assets = parse_id_list(&get("DEFAULT_ASSETS", DEFAULT_ASSETS));
        let stream_assets = parse_id_list(&get("STREAM_ASSETS", DEFAULT_ASSETS));

        let refresh_interval = Duration::from_secs(parse_number(&lookup, "REFRESH_INTERVAL_SECS", 60)?);
        let trending_interval = Duration::from_secs(parse_number(&lookup, "TRENDING_INTERVAL_SECS", 300)?);
        let http_timeout = Duration::from_secs(parse_number(&lookup, "HTTP_TIMEOUT_SECS", 10)?);
        let sparkline_points = parse_number(&lookup, "SPARKLINE_POINTS", 7)?;

        if refresh_interval.is_zero() || trending_interval.is_zero() {
            anyhow::bail!("refresh intervals must be greater than zero");
        }
        if sparkline_points == 0 {
            anyhow::bail!("SPARKLINE_POINTS must be greater than zero");
        }

        let metrics_port = match lookup("METRICS_PORT") {
            Some(raw) if !raw.trim().is_empty() => Some(
                raw.trim()
                    .parse::<u16>()
                    .with_context(|| format!("invalid METRICS_PORT {raw:?}"))?,
            ),
            _ => None,
        };

        Ok(Self {
            log_level,
            api_url,
            stream_url,
            default_assets,
            stream_assets,
            refresh_interval,
            trending_interval,
            http_timeout,
            sparkline_points,
            metrics_port,
        })
    }
}

fn parse_number<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid {key} {raw:?}")),
        None => Ok(default),
    }
}

/// Comma separated ids, lowercased, blanks and duplicates skipped.
fn parse_id_list(raw: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for id in raw.split(',').map(|s| s.trim().to_lowercase()) {
        if !id.is_empty() && !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}
