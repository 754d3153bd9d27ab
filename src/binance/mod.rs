//! Binance REST integration: depth snapshot client, wire types, and the
//! request-weight pacer that budgets snapshot fetches.

pub mod client;
pub mod rate_limiter;
pub mod types;

pub use client::{BinanceRestClient, SnapshotSource};
pub use types::{DepthSnapshot, Product};
