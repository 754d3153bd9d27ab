//! Sequence linker: gates diff application on continuity with the snapshot.
//!
//! A book starts unlinked. The first diff whose id range bridges the
//! snapshot's terminal id links the stream to the snapshot; from then on
//! every diff must chain exactly, and any gap is a desync that forces a cold
//! restart (discard the book, re-snapshot, re-link).
//!
//! The spot and swap dialects disagree on both the bridge test and the chain
//! test: spot chains on `U == lastUpdateId + 1`, swap carries the previous
//! event's final id in `pu` and chains on `pu == lastUpdateId`.

use rust_decimal::Decimal;

use crate::binance::types::Product;
use crate::book::events::DepthDiff;
use crate::error::SyncError;

/// Judgment on a single diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Apply the diff and advance `lastUpdateId` to its final id.
    Apply,
    /// Discard the diff and keep waiting.
    Drop,
}

/// Per-round linker state. A new one is built for every reconciliation round
/// since a cold restart re-seeds `lastUpdateId` from a fresh snapshot.
#[derive(Debug)]
pub struct Linker {
    product: Product,
    linked: bool,
}

impl Linker {
    pub fn new(product: Product) -> Self {
        Self {
            product,
            linked: false,
        }
    }

    pub fn is_linked(&self) -> bool {
        self.linked
    }

    /// Judge one diff against the book's current `lastUpdateId`.
    ///
    /// Returns the verdict, or a desync error once a linked stream breaks
    /// its chain.
    pub fn judge(&mut self, diff: &DepthDiff, last_update_id: Decimal) -> Result<Verdict, SyncError> {
        match self.product {
            Product::Spot => self.judge_spot(diff, last_update_id),
            Product::Swap => self.judge_swap(diff, last_update_id),
        }
    }

    fn judge_spot(&mut self, diff: &DepthDiff, last: Decimal) -> Result<Verdict, SyncError> {
        let snap_id = last + Decimal::ONE;
        if !self.linked {
            if diff.first_update_id <= snap_id && diff.final_update_id >= snap_id {
                self.linked = true;
                return Ok(Verdict::Apply);
            }
            return Ok(Verdict::Drop);
        }
        if diff.first_update_id == snap_id {
            return Ok(Verdict::Apply);
        }
        Err(SyncError::Desync {
            expected: snap_id,
            carried: diff.first_update_id,
        })
    }

    fn judge_swap(&mut self, diff: &DepthDiff, last: Decimal) -> Result<Verdict, SyncError> {
        if !self.linked {
            // Stale batch from before the snapshot.
            if diff.final_update_id < last {
                return Ok(Verdict::Drop);
            }
            if diff.first_update_id <= last && diff.final_update_id >= last {
                self.linked = true;
                return Ok(Verdict::Apply);
            }
            // Future batch; keep waiting for the one that bridges.
            return Ok(Verdict::Drop);
        }
        // A diff without pu cannot prove it chains.
        let prev = diff.prev_final_update_id.unwrap_or_default();
        if prev == last {
            return Ok(Verdict::Apply);
        }
        Err(SyncError::Desync {
            expected: last,
            carried: prev,
        })
    }
}
