//! Polymarket module - read-only market data over the Gamma and CLOB REST APIs

pub mod feed;
pub mod messages;
pub mod rest;

pub use feed::{filter_markets, is_blacklisted, MarketInfo, SnapshotFeed};
pub use rest::PolymarketRestClient;
