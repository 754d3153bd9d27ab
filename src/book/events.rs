//! Typed inbound frame taxonomy for the depth and trade streams.
//!
//! Frames are JSON objects discriminated by the `e` field. Known events
//! decode into [`MarketEvent`]; frames without a recognized discriminator
//! are dropped at the stream edge. Sequence ids are decimals: they arrive
//! as JSON numbers that can exceed the 53-bit float-safe integer range.

use rust_decimal::Decimal;
use serde::Deserialize;

/// One depth-diff batch from the `@depth@100ms` stream.
///
/// Example JSON (swap dialect; spot omits `pu`):
/// ```json
/// {
///   "e": "depthUpdate",
///   "E": 1699999999123,
///   "s": "BTCUSDT",
///   "U": 157,
///   "u": 160,
///   "pu": 149,
///   "b": [["0.0024", "10"]],
///   "a": [["0.0026", "100"]]
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct DepthDiff {
    /// Event timestamp (Unix milliseconds).
    #[serde(rename = "E", default)]
    pub event_time: i64,

    /// First update id in the batch.
    #[serde(rename = "U")]
    pub first_update_id: Decimal,

    /// Final update id in the batch.
    #[serde(rename = "u")]
    pub final_update_id: Decimal,

    /// Final update id of the previous event; swap dialect only.
    #[serde(rename = "pu", default)]
    pub prev_final_update_id: Option<Decimal>,

    /// Bid levels to update, `[price, qty]` string pairs.
    #[serde(rename = "b")]
    pub bids: Vec<[String; 2]>,

    /// Ask levels to update, `[price, qty]` string pairs.
    #[serde(rename = "a")]
    pub asks: Vec<[String; 2]>,
}

/// One trade from the `@trade` (spot) or `@aggTrade` (swap) stream. Both
/// dialects carry the same fields this crate consumes.
#[derive(Debug, Clone, Deserialize)]
pub struct TradeTick {
    /// Trade timestamp (Unix milliseconds).
    #[serde(rename = "T")]
    pub trade_time: i64,

    /// Price as string to preserve precision.
    #[serde(rename = "p")]
    pub price: String,

    /// Quantity as string to preserve precision.
    #[serde(rename = "q")]
    pub qty: String,

    /// Is the buyer the market maker? True means the aggressor sold.
    #[serde(rename = "m")]
    pub buyer_is_maker: bool,
}

impl TradeTick {
    /// True when the trade's aggressor was a seller.
    pub fn aggressor_is_seller(&self) -> bool {
        self.buyer_is_maker
    }
}

/// A decoded inbound frame.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "e")]
pub enum MarketEvent {
    #[serde(rename = "depthUpdate")]
    Depth(DepthDiff),

    #[serde(rename = "trade")]
    Trade(TradeTick),

    #[serde(rename = "aggTrade")]
    AggTrade(TradeTick),
}

/// Discriminators this crate consumes.
const KNOWN_EVENTS: [&str; 3] = ["depthUpdate", "trade", "aggTrade"];

impl MarketEvent {
    /// Decode one frame.
    ///
    /// `Ok(None)` for frames without a recognized `e` discriminator (dropped
    /// silently); `Err` when the frame is not JSON or a known event fails to
    /// decode, which the stream task treats as a transport fault.
    pub fn decode(text: &str) -> Result<Option<Self>, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        match value.get("e").and_then(|e| e.as_str()) {
            Some(event) if KNOWN_EVENTS.contains(&event) => {
                Ok(Some(serde_json::from_value(value)?))
            }
            _ => Ok(None),
        }
    }
}
