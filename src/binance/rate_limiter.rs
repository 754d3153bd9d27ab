//! Weight-aware pacing for REST depth snapshot fetches.
//!
//! Binance meters REST usage in request weight, not request count, and a
//! depth fetch gets heavier with the level limit: the full spot snapshot
//! this crate asks for (limit 5000) costs 250 of a 6000/min budget, the
//! swap snapshot (limit 1000) costs 20 of 2400/min. Cold restarts
//! re-snapshot in a loop, so each fetch reserves its weight against a GCRA
//! budget (via the governor crate) before the request goes out.

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorRateLimiter,
};
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::binance::types::Product;

/// Weight reserved per minute for spot snapshots: half the exchange's
/// 6000/min account budget, leaving the rest to whatever else the process
/// calls.
const SPOT_WEIGHT_PER_MINUTE: u32 = 3000;

/// Weight reserved per minute for swap snapshots (exchange budget 2400/min).
const SWAP_WEIGHT_PER_MINUTE: u32 = 1200;

/// Maximum time a fetch may wait for its weight before giving up.
const QUEUE_TIMEOUT_SECS: u64 = 30;

/// Request weight of a depth snapshot at the given level limit.
///
/// Mirrors the exchange's published tiers for `/api/v3/depth` and
/// `/fapi/v1/depth`.
pub(crate) fn depth_request_weight(product: Product, limit: u32) -> u32 {
    match product {
        Product::Spot => match limit {
            0..=100 => 5,
            101..=500 => 25,
            501..=1000 => 50,
            _ => 250,
        },
        Product::Swap => match limit {
            0..=50 => 2,
            51..=100 => 5,
            101..=500 => 10,
            _ => 20,
        },
    }
}

/// Pacer errors
#[derive(Debug, Error)]
pub enum PacerError {
    #[error("snapshot weight queue timeout after {0}s")]
    QueueTimeout(u64),

    #[error("snapshot weight {weight} exceeds the per-minute budget")]
    WeightAboveBudget { weight: u32 },
}

/// Per-product weight budget for snapshot fetches.
///
/// Heavy fetches queue until enough weight has replenished, up to the queue
/// timeout; a fetch heavier than the whole budget is rejected outright.
pub struct SnapshotPacer {
    limiter: GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    queue_timeout: Duration,
}

impl SnapshotPacer {
    /// Pacer sized to the product's REST weight budget.
    pub fn for_product(product: Product) -> Self {
        let budget = match product {
            Product::Spot => SPOT_WEIGHT_PER_MINUTE,
            Product::Swap => SWAP_WEIGHT_PER_MINUTE,
        };
        Self::with_budget(budget, QUEUE_TIMEOUT_SECS)
    }

    /// Pacer with a custom budget (for testing).
    pub fn with_budget(weight_per_minute: u32, queue_timeout_secs: u64) -> Self {
        let quota = Quota::per_minute(
            NonZeroU32::new(weight_per_minute).expect("weight_per_minute must be non-zero"),
        );

        Self {
            limiter: GovernorRateLimiter::direct(quota),
            queue_timeout: Duration::from_secs(queue_timeout_secs),
        }
    }

    /// Reserve `weight` units of the budget, waiting for replenishment if
    /// the recent restart history has drained it.
    pub async fn acquire(&self, weight: u32) -> Result<(), PacerError> {
        let Some(cells) = NonZeroU32::new(weight) else {
            return Ok(());
        };

        match timeout(self.queue_timeout, self.limiter.until_n_ready(cells)).await {
            Ok(Ok(())) => {
                debug!(weight, "snapshot weight reserved");
                Ok(())
            }
            Ok(Err(_)) => Err(PacerError::WeightAboveBudget { weight }),
            Err(_) => {
                warn!(
                    weight,
                    timeout_secs = self.queue_timeout.as_secs(),
                    "snapshot weight queue timeout exceeded"
                );
                Err(PacerError::QueueTimeout(self.queue_timeout.as_secs()))
            }
        }
    }
}
