//! Rolling-window trade impact ring, one per aggressor side.
//!
//! Three parallel append-only sequences (stamps, quantities, notionals)
//! pruned against a configurable look-back. Stamps are non-decreasing, so
//! pruning only ever removes a prefix. The window sum never requires a prior
//! prune: stale entries are skipped while summing.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct RingCore {
    stamps: Vec<DateTime<Utc>>,
    qty: Vec<Decimal>,
    notional: Vec<Decimal>,
}

/// Time-indexed buffer of recent trades on one aggressor side.
#[derive(Debug, Default)]
pub struct TradeImpactRing {
    inner: RwLock<RingCore>,
}

impl TradeImpactRing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a trade. The notional is derived here so the three sequences
    /// stay consistent under one write lock.
    pub async fn record(&self, stamp: DateTime<Utc>, price: Decimal, qty: Decimal) {
        let mut core = self.inner.write().await;
        core.stamps.push(stamp);
        core.qty.push(qty);
        core.notional.push(price * qty);
    }

    /// Drop every entry whose stamp has aged out of the look-back window.
    ///
    /// The scan stops at the first stamp still inside the window; stamps are
    /// non-decreasing, so everything before it is expired.
    pub async fn prune(&self, now: DateTime<Utc>, look_back: Duration) {
        let mut core = self.inner.write().await;
        let mut loc = None;
        for (i, stamp) in core.stamps.iter().enumerate() {
            if now <= *stamp + look_back {
                break;
            }
            loc = Some(i);
        }
        if let Some(loc) = loc {
            core.stamps.drain(..=loc);
            core.qty.drain(..=loc);
            core.notional.drain(..=loc);
        }
    }

    /// Sum of notionals still inside the look-back window. Stale entries are
    /// skipped, so the result does not depend on when [`prune`] last ran.
    ///
    /// [`prune`]: TradeImpactRing::prune
    pub async fn window_notional(&self, now: DateTime<Utc>, look_back: Duration) -> Decimal {
        let core = self.inner.read().await;
        let mut total = Decimal::ZERO;
        for (i, stamp) in core.stamps.iter().enumerate() {
            if now > *stamp + look_back {
                continue;
            }
            total += core.notional[i];
        }
        total
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.stamps.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.stamps.is_empty()
    }
}
