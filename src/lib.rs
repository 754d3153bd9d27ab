//! Client-side local order book maintainer for Binance markets.
//!
//! Fuses a REST depth snapshot with the `@depth@100ms` diff stream into an
//! in-memory L2 book that tracks the exchange's canonical book, per symbol,
//! for both the spot and perpetual-swap (USDT-margined futures) dialects.
//! Optionally consumes the trade stream to maintain rolling-window aggressor
//! notionals per side.
//!
//! Architecture:
//! - stream tasks decode frames and feed one bounded queue
//! - a supervisor task owns the mutation path: snapshot install, sequence
//!   linking, diff application, stall detection and cold restart on desync
//! - readers take value copies of the ladders through [`book::LocalBook`]
//!   accessors and must check the accompanying ready flag

pub mod binance; // REST snapshot client and wire types
pub mod book; // ladders, trade impact rings, linker, supervisor
pub mod config; // sync engine tuning knobs
pub mod error;

pub use binance::types::{DepthSnapshot, Product};
pub use book::{LevelMicro, LocalBook, MicroTrend, PriceLevel};
pub use config::SyncConfig;
