//! The local order book core.
//!
//! Data flow: stream tasks ([`stream`]) decode frames into typed events
//! ([`events`]) and feed one bounded queue; the supervisor ([`supervisor`])
//! gates every diff through the sequence linker ([`linker`]) and mutates the
//! ladders ([`ladder`]) and trade impact rings ([`impact`]) owned by
//! [`LocalBook`] ([`state`]).

pub mod events;
pub mod impact;
pub mod ladder;
pub mod linker;
pub mod state;

pub(crate) mod stream;
pub(crate) mod supervisor;

pub use events::{DepthDiff, MarketEvent, TradeTick};
pub use impact::TradeImpactRing;
pub use ladder::{Ladder, LevelMicro, MicroTrend, PriceLevel, Side};
pub use linker::{Linker, Verdict};
pub use state::LocalBook;
