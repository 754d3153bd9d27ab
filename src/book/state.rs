//! Per-symbol book container and its analytics surface.
//!
//! A [`LocalBook`] owns the two ladders, the two trade impact rings and the
//! sync metadata. The supervisor spawned by [`LocalBook::open_spot`] /
//! [`LocalBook::open_swap`] is the only mutator; readers get value copies
//! and a ready flag, and must retry when the flag is false (the book goes
//! briefly unready around reconnects and cold restarts).

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::binance::client::{BinanceRestClient, SnapshotSource};
use crate::binance::types::{DepthSnapshot, Product};
use crate::book::events::{DepthDiff, TradeTick};
use crate::book::impact::TradeImpactRing;
use crate::book::ladder::{Ladder, LevelMicro, MicroTrend, PriceLevel};
use crate::book::supervisor;
use crate::config::SyncConfig;

/// Analytic range shared by the impact predicates: the trade look-back
/// window and the inclusive ladder level range summed against it.
#[derive(Debug, Clone, Copy)]
struct ImpactRange {
    look_back: Duration,
    from_level: usize,
    to_level: usize,
}

impl Default for ImpactRange {
    fn default() -> Self {
        Self {
            look_back: Duration::seconds(5),
            from_level: 0,
            to_level: 19,
        }
    }
}

/// Local L2 book for one symbol, kept in sync with the exchange by a
/// background supervisor.
pub struct LocalBook {
    product: Product,
    symbol: String,
    bids: Ladder,
    asks: Ladder,
    buy_trades: TradeImpactRing,
    sell_trades: TradeImpactRing,
    last_update_id: RwLock<Decimal>,
    snapshotted: AtomicBool,
    range: RwLock<ImpactRange>,
    cancel: CancellationToken,
}

impl LocalBook {
    pub(crate) fn new(product: Product, symbol: &str) -> Self {
        Self {
            product,
            symbol: symbol.to_uppercase(),
            bids: Ladder::bid(),
            asks: Ladder::ask(),
            buy_trades: TradeImpactRing::new(),
            sell_trades: TradeImpactRing::new(),
            last_update_id: RwLock::new(Decimal::ZERO),
            snapshotted: AtomicBool::new(false),
            range: RwLock::new(ImpactRange::default()),
            cancel: CancellationToken::new(),
        }
    }

    /// Open a spot book and start its supervisor. `stream_trades` also
    /// subscribes the `@trade` stream to feed the impact rings.
    ///
    /// Must be called within a tokio runtime.
    pub fn open_spot(symbol: &str, stream_trades: bool) -> Arc<Self> {
        Self::open_with(Product::Spot, symbol, stream_trades, SyncConfig::default())
    }

    /// Open a perpetual-swap book and start its supervisor. `stream_trades`
    /// also subscribes the `@aggTrade` stream.
    ///
    /// Must be called within a tokio runtime.
    pub fn open_swap(symbol: &str, stream_trades: bool) -> Arc<Self> {
        Self::open_with(Product::Swap, symbol, stream_trades, SyncConfig::default())
    }

    /// Open a book with custom sync tuning against the production REST
    /// client.
    pub fn open_with(
        product: Product,
        symbol: &str,
        stream_trades: bool,
        cfg: SyncConfig,
    ) -> Arc<Self> {
        Self::open_with_source(product, symbol, stream_trades, cfg, BinanceRestClient::new())
    }

    /// Open a book against a custom snapshot source, e.g. a stub in tests or
    /// a proxying fetcher.
    pub fn open_with_source<S>(
        product: Product,
        symbol: &str,
        stream_trades: bool,
        cfg: SyncConfig,
        source: S,
    ) -> Arc<Self>
    where
        S: SnapshotSource + Send + Sync + 'static,
    {
        let book = Arc::new(Self::new(product, symbol));
        supervisor::spawn(Arc::clone(&book), source, stream_trades, cfg);
        info!(symbol = %book.symbol, %product, "local order book opened");
        book
    }

    /// Cancel the supervisor and empty the ladders. A closed book is not
    /// reusable; open a new one instead.
    pub async fn close(&self) {
        self.cancel.cancel();
        self.snapshotted.store(false, Ordering::Release);
        self.bids.clear().await;
        self.asks.clear().await;
        info!(symbol = %self.symbol, product = %self.product, "local order book closed");
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn product(&self) -> Product {
        self.product
    }

    // ---- reader surface -------------------------------------------------

    /// Full bid ladder and a ready flag. Unready until the book is
    /// snapshotted and non-empty.
    pub async fn get_bids(&self) -> (Vec<PriceLevel>, bool) {
        self.side_view(&self.bids).await
    }

    /// Full ask ladder and a ready flag.
    pub async fn get_asks(&self) -> (Vec<PriceLevel>, bool) {
        self.side_view(&self.asks).await
    }

    async fn side_view(&self, ladder: &Ladder) -> (Vec<PriceLevel>, bool) {
        if !self.is_snapshotted() {
            return (Vec::new(), false);
        }
        let levels = ladder.levels().await;
        if levels.is_empty() {
            return (Vec::new(), false);
        }
        (levels, true)
    }

    /// Bid prefix deep enough to absorb `value` of quote notional.
    pub async fn get_bids_for_value(&self, value: Decimal) -> (Vec<PriceLevel>, bool) {
        if !self.is_snapshotted() {
            return (Vec::new(), false);
        }
        self.bids.prefix_until_notional(value).await
    }

    /// Ask prefix deep enough to absorb `value` of quote notional.
    pub async fn get_asks_for_value(&self, value: Decimal) -> (Vec<PriceLevel>, bool) {
        if !self.is_snapshotted() {
            return (Vec::new(), false);
        }
        self.asks.prefix_until_notional(value).await
    }

    /// Copy of the micro annotation at bid level `idx`; `None` while the
    /// book is unready or the level does not exist.
    pub async fn get_bid_micro(&self, idx: usize) -> Option<LevelMicro> {
        if !self.is_snapshotted() {
            return None;
        }
        self.bids.micro_at(idx).await
    }

    /// Copy of the micro annotation at ask level `idx`.
    pub async fn get_ask_micro(&self, idx: usize) -> Option<LevelMicro> {
        if !self.is_snapshotted() {
            return None;
        }
        self.asks.micro_at(idx).await
    }

    /// Notional of buy-aggressor trades inside the look-back window.
    pub async fn buy_impact_notional(&self) -> Decimal {
        let look_back = self.range.read().await.look_back;
        self.buy_trades.window_notional(Utc::now(), look_back).await
    }

    /// Notional of sell-aggressor trades inside the look-back window.
    pub async fn sell_impact_notional(&self) -> Decimal {
        let look_back = self.range.read().await.look_back;
        self.sell_trades
            .window_notional(Utc::now(), look_back)
            .await
    }

    /// Resting bid notional over the configured level range.
    pub async fn bid_cum_notional(&self) -> (Decimal, bool) {
        let range = *self.range.read().await;
        self.bids.cum_notional(range.from_level, range.to_level).await
    }

    /// Resting ask notional over the configured level range.
    pub async fn ask_cum_notional(&self) -> (Decimal, bool) {
        let range = *self.range.read().await;
        self.asks.cum_notional(range.from_level, range.to_level).await
    }

    /// Book-sweep predicate for the bid side: recent sell-aggressor flow
    /// outweighs the visible resting bids and the top tracked level last
    /// shrank.
    pub async fn is_big_impact_on_bid(&self) -> bool {
        let impact = self.sell_impact_notional().await;
        let (resting, ready) = self.bid_cum_notional().await;
        if !ready {
            return false;
        }
        let from_level = self.range.read().await.from_level;
        let Some(micro) = self.get_bid_micro(from_level).await else {
            return false;
        };
        impact >= resting && micro.trend == MicroTrend::Cut
    }

    /// Book-sweep predicate for the ask side.
    pub async fn is_big_impact_on_ask(&self) -> bool {
        let impact = self.buy_impact_notional().await;
        let (resting, ready) = self.ask_cum_notional().await;
        if !ready {
            return false;
        }
        let from_level = self.range.read().await.from_level;
        let Some(micro) = self.get_ask_micro(from_level).await else {
            return false;
        };
        impact >= resting && micro.trend == MicroTrend::Cut
    }

    /// Set the trade impact look-back window.
    pub async fn set_lookback_secs(&self, secs: i64) {
        self.range.write().await.look_back = Duration::seconds(secs);
    }

    /// Sum the top `top_k` levels in the cumulative notional queries; level
    /// 1 is the top of the book.
    pub async fn set_impact_cum_range(&self, top_k: usize) {
        let mut range = self.range.write().await;
        range.from_level = 0;
        range.to_level = top_k.saturating_sub(1);
    }

    // ---- supervisor surface ---------------------------------------------

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub(crate) fn is_snapshotted(&self) -> bool {
        self.snapshotted.load(Ordering::Acquire)
    }

    /// Forget the previous round's link state ahead of a fresh snapshot.
    pub(crate) async fn reset_sync(&self) {
        self.snapshotted.store(false, Ordering::Release);
        *self.last_update_id.write().await = Decimal::ZERO;
    }

    pub(crate) async fn last_update_id(&self) -> Decimal {
        *self.last_update_id.read().await
    }

    pub(crate) async fn set_last_update_id(&self, id: Decimal) {
        *self.last_update_id.write().await = id;
    }

    /// Install a REST snapshot: replace both ladders, seed the sequence
    /// cursor, and mark the book snapshotted.
    pub(crate) async fn install_snapshot(&self, snapshot: &DepthSnapshot) {
        self.bids.install(&snapshot.bids).await;
        self.asks.install(&snapshot.asks).await;
        self.set_last_update_id(snapshot.last_update_id).await;
        self.snapshotted.store(true, Ordering::Release);
        info!(
            symbol = %self.symbol,
            product = %self.product,
            last_update_id = %snapshot.last_update_id,
            bid_levels = snapshot.bids.len(),
            ask_levels = snapshot.asks.len(),
            "depth snapshot installed"
        );
    }

    /// Apply an accepted diff to both ladders. Levels within one side are
    /// applied in the order received; undecodable levels are skipped.
    pub(crate) async fn apply_diff(&self, diff: &DepthDiff) {
        for entry in &diff.bids {
            let (Ok(price), Ok(qty)) = (
                Decimal::from_str(&entry[0]),
                Decimal::from_str(&entry[1]),
            ) else {
                continue;
            };
            self.bids.apply(price, qty).await;
        }
        for entry in &diff.asks {
            let (Ok(price), Ok(qty)) = (
                Decimal::from_str(&entry[0]),
                Decimal::from_str(&entry[1]),
            ) else {
                continue;
            };
            self.asks.apply(price, qty).await;
        }
    }

    /// Record one trade into the aggressor-side ring, then expire both rings
    /// against the look-back window.
    pub(crate) async fn record_trade(&self, tick: &TradeTick) {
        let Some(stamp) = Utc.timestamp_millis_opt(tick.trade_time).single() else {
            return;
        };
        let (Ok(price), Ok(qty)) = (
            Decimal::from_str(&tick.price),
            Decimal::from_str(&tick.qty),
        ) else {
            return;
        };

        let ring = if tick.aggressor_is_seller() {
            &self.sell_trades
        } else {
            &self.buy_trades
        };
        ring.record(stamp, price, qty).await;

        let look_back = self.range.read().await.look_back;
        let now = Utc::now();
        self.buy_trades.prune(now, look_back).await;
        self.sell_trades.prune(now, look_back).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn raw(levels: &[(&str, &str)]) -> Vec<[String; 2]> {
        levels
            .iter()
            .map(|(p, q)| [p.to_string(), q.to_string()])
            .collect()
    }

    fn snapshot(bids: &[(&str, &str)], asks: &[(&str, &str)], id: u64) -> DepthSnapshot {
        DepthSnapshot {
            last_update_id: Decimal::from(id),
            bids: raw(bids),
            asks: raw(asks),
        }
    }

    #[tokio::test]
    async fn test_readers_unready_before_snapshot() {
        let book = LocalBook::new(Product::Spot, "btcusdt");

        let (bids, ready) = book.get_bids().await;
        assert!(!ready);
        assert!(bids.is_empty());
        assert!(book.get_bid_micro(0).await.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_install_seeds_micro_and_cursor() {
        let book = LocalBook::new(Product::Spot, "btcusdt");
        book.install_snapshot(&snapshot(
            &[("100", "1"), ("99", "2")],
            &[("101", "1")],
            77,
        ))
        .await;

        assert!(book.is_snapshotted());
        assert_eq!(book.last_update_id().await, Decimal::from(77u64));

        let (bids, ready) = book.get_bids().await;
        assert!(ready);
        assert_eq!(bids.len(), 2);

        let micro = book.get_bid_micro(0).await.unwrap();
        assert_eq!(micro.order_num, 1);
        assert_eq!(micro.trend, MicroTrend::None);
    }

    #[tokio::test]
    async fn test_symbol_uppercased() {
        let book = LocalBook::new(Product::Spot, "btcusdt");
        assert_eq!(book.symbol(), "BTCUSDT");
    }

    #[tokio::test]
    async fn test_get_bids_for_value_truncates() {
        let book = LocalBook::new(Product::Spot, "btcusdt");
        book.install_snapshot(&snapshot(
            &[("100", "1"), ("99", "2"), ("98", "3")],
            &[],
            1,
        ))
        .await;

        let (prefix, ready) = book.get_bids_for_value(dec("250")).await;
        assert!(ready);
        assert_eq!(prefix.len(), 2);
    }

    #[tokio::test]
    async fn test_impact_cum_range_setter() {
        let book = LocalBook::new(Product::Spot, "btcusdt");
        book.set_impact_cum_range(7).await;

        let range = *book.range.read().await;
        assert_eq!(range.from_level, 0);
        assert_eq!(range.to_level, 6);
    }

    #[tokio::test]
    async fn test_record_trade_routes_by_aggressor() {
        let book = LocalBook::new(Product::Spot, "btcusdt");

        // Buyer is maker: the aggressor sold.
        book.record_trade(&TradeTick {
            trade_time: Utc::now().timestamp_millis(),
            price: "100".to_string(),
            qty: "2".to_string(),
            buyer_is_maker: true,
        })
        .await;
        // Buyer is taker: the aggressor bought.
        book.record_trade(&TradeTick {
            trade_time: Utc::now().timestamp_millis(),
            price: "100".to_string(),
            qty: "1".to_string(),
            buyer_is_maker: false,
        })
        .await;

        assert_eq!(book.sell_impact_notional().await, dec("200"));
        assert_eq!(book.buy_impact_notional().await, dec("100"));
    }

    #[tokio::test]
    async fn test_record_trade_skips_malformed() {
        let book = LocalBook::new(Product::Spot, "btcusdt");

        book.record_trade(&TradeTick {
            trade_time: Utc::now().timestamp_millis(),
            price: "bogus".to_string(),
            qty: "1".to_string(),
            buyer_is_maker: false,
        })
        .await;

        assert_eq!(book.buy_impact_notional().await, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_big_impact_on_bid_requires_cut_trend() {
        let book = LocalBook::new(Product::Spot, "btcusdt");
        book.install_snapshot(&snapshot(&[("100", "1"), ("99", "1")], &[], 1))
            .await;

        // Sell flow dwarfs the resting bids but the top level never shrank.
        book.sell_trades
            .record(Utc::now(), dec("1000"), dec("10"))
            .await;
        assert!(!book.is_big_impact_on_bid().await);

        // A qty increase at the top stamps the inverted Cut trend.
        book.apply_diff(&DepthDiff {
            event_time: 0,
            first_update_id: Decimal::from(2u64),
            final_update_id: Decimal::from(2u64),
            prev_final_update_id: None,
            bids: raw(&[("100", "5")]),
            asks: Vec::new(),
        })
        .await;
        assert!(book.is_big_impact_on_bid().await);
    }

    #[tokio::test]
    async fn test_big_impact_needs_enough_flow() {
        let book = LocalBook::new(Product::Swap, "ethusdt");
        book.install_snapshot(&snapshot(&[], &[("100", "1"), ("101", "1")], 1))
            .await;

        // Stamp Cut on the top ask.
        book.apply_diff(&DepthDiff {
            event_time: 0,
            first_update_id: Decimal::from(2u64),
            final_update_id: Decimal::from(2u64),
            prev_final_update_id: Some(Decimal::from(1u64)),
            bids: Vec::new(),
            asks: raw(&[("100", "4")]),
        })
        .await;

        // Buy flow (100) below resting ask notional (400 + 101).
        book.buy_trades
            .record(Utc::now(), dec("100"), dec("1"))
            .await;
        assert!(!book.is_big_impact_on_ask().await);

        book.buy_trades
            .record(Utc::now(), dec("100"), dec("10"))
            .await;
        assert!(book.is_big_impact_on_ask().await);
    }

    #[tokio::test]
    async fn test_close_empties_book() {
        let book = LocalBook::new(Product::Spot, "btcusdt");
        book.install_snapshot(&snapshot(&[("100", "1")], &[("101", "1")], 1))
            .await;

        book.close().await;

        assert!(book.cancel_token().is_cancelled());
        let (bids, ready) = book.get_bids().await;
        assert!(!ready);
        assert!(bids.is_empty());
    }

    #[tokio::test]
    async fn test_reset_sync_clears_cursor() {
        let book = LocalBook::new(Product::Spot, "btcusdt");
        book.install_snapshot(&snapshot(&[("100", "1")], &[], 9)).await;

        book.reset_sync().await;

        assert!(!book.is_snapshotted());
        assert_eq!(book.last_update_id().await, Decimal::ZERO);
    }
}
