// Rolling trade impact window: the sum is defined by stamps alone and never
// depends on when pruning last ran.

use binance_localbook::book::TradeImpactRing;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

#[tokio::test]
async fn window_sum_matches_prune_boundaries() {
    let ring = TradeImpactRing::new();
    let now = Utc::now();
    let look_back = Duration::seconds(5);

    ring.record(now - Duration::seconds(6), dec("100"), dec("1"))
        .await;
    ring.record(now - Duration::seconds(4), dec("50"), dec("1"))
        .await;
    ring.record(now - Duration::seconds(1), dec("30"), dec("1"))
        .await;

    // Stale entry skipped without a prune.
    assert_eq!(ring.window_notional(now, look_back).await, dec("80"));

    // Prune drops the expired prefix; the window sum is unchanged.
    ring.prune(now, look_back).await;
    assert_eq!(ring.len().await, 2);
    assert_eq!(ring.window_notional(now, look_back).await, dec("80"));
}

#[tokio::test]
async fn repeated_prunes_never_grow_the_ring() {
    let ring = TradeImpactRing::new();
    let now = Utc::now();
    let look_back = Duration::seconds(5);

    for age in [30, 20, 10, 4, 1] {
        ring.record(now - Duration::seconds(age), dec("10"), dec("2"))
            .await;
    }

    let mut previous = ring.len().await;
    for _ in 0..3 {
        ring.prune(now, look_back).await;
        let current = ring.len().await;
        assert!(current <= previous);
        previous = current;
    }
    assert_eq!(previous, 2);
}
