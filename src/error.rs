use thiserror::Error;

/// Failure of a REST call against the market data API.
/// Always recoverable: the caller logs it and leaves state untouched.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Unknown asset: {0}")]
    NotFound(String),

    #[error("Malformed response: {0}")]
    Decode(String),
}

/// Failure on the price stream. Malformed payloads are dropped,
/// transport failures trigger a reconnect.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Malformed price payload: {0}")]
    Malformed(String),

    #[error("WebSocket error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),
}

/// User input rejected at the command boundary. No state is mutated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("asset id must not be empty")]
    EmptyAssetId,

    #[error("alert price must be a finite non-negative number, got {0:?}")]
    InvalidAlertPrice(String),

    #[error("quantity must be a decimal number, got {0:?}")]
    InvalidQuantity(String),

    #[error("holding for {asset_id} cannot go below zero (held {held}, delta {delta})")]
    NegativeQuantity {
        asset_id: String,
        held: String,
        delta: String,
    },

    #[error("unknown feed filter {0:?} (expected all, youtube, twitter or news)")]
    UnknownFeedFilter(String),

    #[error("feed source must not be empty")]
    EmptyFeedSource,

    #[error("unknown command {0:?}")]
    UnknownCommand(String),

    #[error("usage: {0}")]
    Usage(&'static str),
}

impl InputError {
    /// Short label used for the rejection counter.
    pub fn kind(&self) -> &'static str {
        match self {
            InputError::EmptyAssetId => "empty_asset_id",
            InputError::InvalidAlertPrice(_) => "invalid_alert_price",
            InputError::InvalidQuantity(_) => "invalid_quantity",
            InputError::NegativeQuantity { .. } => "negative_quantity",
            InputError::UnknownFeedFilter(_) => "unknown_feed_filter",
            InputError::EmptyFeedSource => "empty_feed_source",
            InputError::UnknownCommand(_) => "unknown_command",
            InputError::Usage(_) => "usage",
        }
    }
}
