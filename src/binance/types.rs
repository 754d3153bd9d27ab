//! Wire types shared by the REST client and the stream tasks.

use rust_decimal::Decimal;
use serde::Deserialize;

/// Market dialect. Spot and perpetual-swap books speak different sequence
/// protocols and live on different endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Product {
    /// Spot markets (`stream.binance.com`).
    Spot,
    /// USDT-margined perpetual swaps (`fstream3.binance.com`).
    Swap,
}

impl Product {
    /// Websocket base URL; raw streams are accessed at `/ws/<streamName>`.
    pub(crate) fn ws_base(&self) -> &'static str {
        match self {
            Product::Spot => "wss://stream.binance.com:9443/ws/",
            Product::Swap => "wss://fstream3.binance.com/ws/",
        }
    }

    /// Channel suffix of the depth-diff stream.
    pub(crate) fn depth_channel(&self) -> &'static str {
        "@depth@100ms"
    }

    /// Channel suffix of the trade stream. Swap markets only publish
    /// aggregated trades.
    pub(crate) fn trade_channel(&self) -> &'static str {
        match self {
            Product::Spot => "@trade",
            Product::Swap => "@aggTrade",
        }
    }

    /// Depth levels requested for the initial REST snapshot.
    pub(crate) fn snapshot_limit(&self) -> u32 {
        match self {
            Product::Spot => 5000,
            Product::Swap => 1000,
        }
    }
}

impl std::fmt::Display for Product {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Product::Spot => f.write_str("spot"),
            Product::Swap => f.write_str("swap"),
        }
    }
}

/// REST depth snapshot payload.
///
/// Bids arrive pre-sorted descending and asks ascending; levels are
/// `[price, qty]` string pairs to preserve precision. The terminal update id
/// seeds the sequence linker.
///
/// # Example Response
/// ```json
/// {
///   "lastUpdateId": 1027024,
///   "bids": [["4.00000000", "431.00000000"]],
///   "asks": [["4.00000200", "12.00000000"]]
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepthSnapshot {
    /// Terminal update id covered by this snapshot.
    pub last_update_id: Decimal,

    /// Bid levels, best first.
    pub bids: Vec<[String; 2]>,

    /// Ask levels, best first.
    pub asks: Vec<[String; 2]>,
}
