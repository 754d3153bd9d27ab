// Snapshot handoff flows: a ladder seeded from a snapshot, diffs gated by
// the linker, and the resulting book state.

use binance_localbook::book::{DepthDiff, Ladder, Linker, MicroTrend, Verdict};
use binance_localbook::Product;
use rust_decimal::Decimal;
use std::str::FromStr;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn raw(levels: &[(&str, &str)]) -> Vec<[String; 2]> {
    levels
        .iter()
        .map(|(p, q)| [p.to_string(), q.to_string()])
        .collect()
}

fn diff(first: u64, last: u64, prev: Option<u64>) -> DepthDiff {
    DepthDiff {
        event_time: 0,
        first_update_id: Decimal::from(first),
        final_update_id: Decimal::from(last),
        prev_final_update_id: prev.map(Decimal::from),
        bids: Vec::new(),
        asks: Vec::new(),
    }
}

#[tokio::test]
async fn spot_handoff_links_once_a_diff_bridges_the_snapshot() {
    let mut linker = Linker::new(Product::Spot);
    let mut last = Decimal::from(100u64);

    // Pre-snapshot diff that does not reach the snapshot id is dropped.
    assert_eq!(linker.judge(&diff(90, 95, None), last).unwrap(), Verdict::Drop);
    assert!(!linker.is_linked());

    // A diff spanning lastUpdateId + 1 links the book.
    let bridging = diff(95, 102, None);
    assert_eq!(linker.judge(&bridging, last).unwrap(), Verdict::Apply);
    last = bridging.final_update_id;

    // Contiguous follow-up chains; a gap desyncs.
    let next = diff(103, 105, None);
    assert_eq!(linker.judge(&next, last).unwrap(), Verdict::Apply);
    last = next.final_update_id;
    assert!(linker.judge(&diff(107, 110, None), last).is_err());
}

#[tokio::test]
async fn swap_handoff_chains_on_previous_final_id() {
    let mut linker = Linker::new(Product::Swap);
    let mut last = Decimal::from(500u64);

    let bridging = diff(495, 505, Some(494));
    assert_eq!(linker.judge(&bridging, last).unwrap(), Verdict::Apply);
    last = bridging.final_update_id;

    for (first, final_id, prev) in [(506, 510, 505), (512, 515, 510)] {
        let d = diff(first, final_id, Some(prev));
        assert_eq!(linker.judge(&d, last).unwrap(), Verdict::Apply);
        last = d.final_update_id;
    }

    assert!(linker.judge(&diff(516, 520, Some(514)), last).is_err());
}

#[tokio::test]
async fn ladder_tracks_diff_stream_after_install() {
    let ladder = Ladder::bid();
    ladder.install(&raw(&[("100", "1"), ("99", "2")])).await;

    // New best bid.
    ladder.apply(dec("101"), dec("3")).await;
    // Overwrite with a smaller qty: inverted trend says Add.
    ladder.apply(dec("100"), dec("0.5")).await;
    // Delete the tail level.
    ladder.apply(dec("99"), Decimal::ZERO).await;

    let (levels, micro) = ladder.view().await;
    assert_eq!(levels.len(), 2);
    assert_eq!(levels[0].price, dec("101"));
    assert_eq!(levels[1].price, dec("100"));
    assert_eq!(micro[0].trend, MicroTrend::None);
    assert_eq!(micro[1].trend, MicroTrend::Add);
    assert_eq!(micro[1].order_num, 2);
}

#[tokio::test]
async fn ladder_notional_queries_respect_ready_flags() {
    let ladder = Ladder::ask();

    let (prefix, ready) = ladder.prefix_until_notional(dec("100")).await;
    assert!(!ready);
    assert!(prefix.is_empty());

    ladder
        .install(&raw(&[("10", "1"), ("11", "1"), ("12", "1")]))
        .await;

    let (prefix, ready) = ladder.prefix_until_notional(dec("15")).await;
    assert!(ready);
    assert_eq!(prefix.len(), 2);

    let (total, ready) = ladder.cum_notional(0, 2).await;
    assert!(ready);
    assert_eq!(total, dec("33"));

    let (_, ready) = ladder.cum_notional(2, 0).await;
    assert!(!ready);
}
