//! Sorted price-level ladder, one per side, with per-level micro-structure
//! metadata.
//!
//! The ladder keeps two parallel sequences: the levels themselves and a
//! micro annotation per level (a heuristic resting-order count and the last
//! observed quantity-change direction). Bids are held descending in price,
//! asks ascending. All mutation happens under the ladder's write lock;
//! readers take value copies under the read lock.

use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;
use tokio::sync::RwLock;

/// One price level of the book. A stored level always has `qty > 0`; a zero
/// quantity in a diff is a delete marker and is never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub qty: Decimal,
}

/// Last observed quantity-change direction at a price level.
///
/// The labels are a deliberate micro-structure heuristic and read inverted
/// from their plain English meaning: a shrinking resting size is taken as
/// orders joining the consumption of that price (`Add`), a growing resting
/// size as interest being pulled forward (`Cut`). Downstream sweep detection
/// relies on this exact mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MicroTrend {
    #[default]
    None,
    Add,
    Cut,
}

/// Per-level micro-structure annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelMicro {
    /// Heuristic resting-order count, never below 1.
    pub order_num: u32,
    /// Direction of the last quantity change at this price.
    pub trend: MicroTrend,
}

impl LevelMicro {
    fn seed() -> Self {
        Self {
            order_num: 1,
            trend: MicroTrend::None,
        }
    }
}

/// Which side of the book a ladder holds. Determines sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    /// True when a level at `price` belongs strictly in front of one at
    /// `book_price`: higher for bids, lower for asks.
    fn outranks(&self, price: Decimal, book_price: Decimal) -> bool {
        match self {
            Side::Bid => price > book_price,
            Side::Ask => price < book_price,
        }
    }
}

/// Core of a ladder, always accessed through the owning lock in [`Ladder`].
#[derive(Debug)]
pub(crate) struct LadderCore {
    side: Side,
    levels: Vec<PriceLevel>,
    micro: Vec<LevelMicro>,
}

impl LadderCore {
    fn new(side: Side) -> Self {
        Self {
            side,
            levels: Vec::new(),
            micro: Vec::new(),
        }
    }

    /// Replace the whole book with snapshot levels, seeding each micro entry
    /// at `order_num = 1`. Undecodable price or qty strings are skipped.
    pub(crate) fn install(&mut self, raw: &[[String; 2]]) {
        self.levels.clear();
        self.micro.clear();
        for entry in raw {
            let (Ok(price), Ok(qty)) = (
                Decimal::from_str(&entry[0]),
                Decimal::from_str(&entry[1]),
            ) else {
                continue;
            };
            self.levels.push(PriceLevel { price, qty });
            self.micro.push(LevelMicro::seed());
        }
    }

    /// Apply a single diff level.
    ///
    /// Scans in book order. A price in front of the current level inserts
    /// there, a price behind the last level appends, an exact match either
    /// deletes (`qty == 0`) or overwrites the quantity while updating the
    /// micro annotation. A delete of a missing price is a no-op, and an
    /// empty ladder only refills via snapshot install.
    pub(crate) fn apply(&mut self, price: Decimal, qty: Decimal) {
        let len = self.levels.len();
        for level in 0..len {
            let book_price = self.levels[level].price;

            if self.side.outranks(price, book_price) {
                if qty.is_zero() {
                    return;
                }
                self.levels.insert(level, PriceLevel { price, qty });
                self.micro.insert(level, LevelMicro::seed());
                return;
            }

            if price == book_price {
                if qty.is_zero() {
                    self.levels.remove(level);
                    self.micro.remove(level);
                    return;
                }
                let old_qty = self.levels[level].qty;
                let micro = &mut self.micro[level];
                if old_qty > qty {
                    micro.order_num += 1;
                    micro.trend = MicroTrend::Add;
                } else if old_qty < qty {
                    micro.order_num = micro.order_num.saturating_sub(1).max(1);
                    micro.trend = MicroTrend::Cut;
                }
                self.levels[level].qty = qty;
                return;
            }

            // Ranks behind the current level.
            if level == len - 1 {
                if qty.is_zero() {
                    return;
                }
                self.levels.push(PriceLevel { price, qty });
                self.micro.push(LevelMicro::seed());
                return;
            }
        }
    }

    /// Inclusive prefix of the book up to and including the first level where
    /// the cumulative notional exceeds `value`. Not ready on an empty book.
    /// When the cumulative sum never exceeds `value` the prefix is the first
    /// level alone.
    pub(crate) fn prefix_until_notional(&self, value: Decimal) -> (Vec<PriceLevel>, bool) {
        if self.levels.is_empty() {
            return (Vec::new(), false);
        }
        let mut loc = 0;
        let mut sum = Decimal::ZERO;
        for (level, entry) in self.levels.iter().enumerate() {
            sum += entry.price * entry.qty;
            if sum > value {
                loc = level;
                break;
            }
        }
        (self.levels[..=loc].to_vec(), true)
    }

    /// Sum of `price * qty` over levels `[from, to]` inclusive. Not ready on
    /// an empty book or an inverted range.
    pub(crate) fn cum_notional(&self, from: usize, to: usize) -> (Decimal, bool) {
        if self.levels.is_empty() || from > to {
            return (Decimal::ZERO, false);
        }
        let total = self
            .levels
            .iter()
            .skip(from)
            .take(to - from + 1)
            .map(|entry| entry.price * entry.qty)
            .sum();
        (total, true)
    }

    pub(crate) fn len(&self) -> usize {
        self.levels.len()
    }
}

/// A sorted price-level list for one side of the book.
pub struct Ladder {
    inner: RwLock<LadderCore>,
}

impl Ladder {
    pub fn bid() -> Self {
        Self {
            inner: RwLock::new(LadderCore::new(Side::Bid)),
        }
    }

    pub fn ask() -> Self {
        Self {
            inner: RwLock::new(LadderCore::new(Side::Ask)),
        }
    }

    /// Replace the whole book with snapshot levels.
    pub async fn install(&self, raw: &[[String; 2]]) {
        self.inner.write().await.install(raw);
    }

    /// Apply one diff level under the write lock.
    pub async fn apply(&self, price: Decimal, qty: Decimal) {
        self.inner.write().await.apply(price, qty);
    }

    /// Value copy of the levels.
    pub async fn levels(&self) -> Vec<PriceLevel> {
        self.inner.read().await.levels.clone()
    }

    /// Value copies of both parallel sequences.
    pub async fn view(&self) -> (Vec<PriceLevel>, Vec<LevelMicro>) {
        let core = self.inner.read().await;
        (core.levels.clone(), core.micro.clone())
    }

    /// Copy of the micro annotation at `idx`, if present.
    pub async fn micro_at(&self, idx: usize) -> Option<LevelMicro> {
        self.inner.read().await.micro.get(idx).copied()
    }

    /// Inclusive prefix up to the first level where cumulative notional
    /// exceeds `value`. The emptiness test happens under the read lock.
    pub async fn prefix_until_notional(&self, value: Decimal) -> (Vec<PriceLevel>, bool) {
        self.inner.read().await.prefix_until_notional(value)
    }

    /// Sum of `price * qty` over levels `[from, to]` inclusive. The
    /// emptiness test happens under the read lock.
    pub async fn cum_notional(&self, from: usize, to: usize) -> (Decimal, bool) {
        self.inner.read().await.cum_notional(from, to)
    }

    /// Drop every level. Used on close and cold restart.
    pub async fn clear(&self) {
        let mut core = self.inner.write().await;
        core.levels.clear();
        core.micro.clear();
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.len() == 0
    }
}
