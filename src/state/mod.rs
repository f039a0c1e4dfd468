pub mod alerts;
pub mod feed;
pub mod hub;
pub mod market;
pub mod market_cache;
pub mod portfolio;
pub mod view;
