// Inbound frame taxonomy over the public decode entry point.

use binance_localbook::book::MarketEvent;
use rust_decimal::Decimal;

#[test]
fn depth_update_round_trips_ids_and_levels() {
    let json = r#"{
        "e": "depthUpdate",
        "E": 1699999999123,
        "s": "BTCUSDT",
        "U": 157,
        "u": 160,
        "b": [["0.0024", "10"]],
        "a": [["0.0026", "100"], ["0.0027", "0"]]
    }"#;

    let MarketEvent::Depth(diff) = MarketEvent::decode(json).unwrap().unwrap() else {
        panic!("expected a depth event");
    };
    assert_eq!(diff.first_update_id, Decimal::from(157));
    assert_eq!(diff.final_update_id, Decimal::from(160));
    assert_eq!(diff.bids.len(), 1);
    assert_eq!(diff.asks[1][1], "0");
}

#[test]
fn trade_and_agg_trade_share_the_tick_shape() {
    let spot = r#"{"e":"trade","T":1672531199999,"p":"16800.50","q":"1.25","m":true}"#;
    let swap = r#"{"e":"aggTrade","T":1672531199999,"p":"16800.50","q":"1.25","m":false}"#;

    let MarketEvent::Trade(tick) = MarketEvent::decode(spot).unwrap().unwrap() else {
        panic!("expected a spot trade");
    };
    assert!(tick.aggressor_is_seller());

    let MarketEvent::AggTrade(tick) = MarketEvent::decode(swap).unwrap().unwrap() else {
        panic!("expected an aggregated trade");
    };
    assert!(!tick.aggressor_is_seller());
}

#[test]
fn unrecognized_events_are_dropped_not_errors() {
    assert!(MarketEvent::decode(r#"{"e":"kline","k":{}}"#)
        .unwrap()
        .is_none());
    assert!(MarketEvent::decode(r#"{"result":null,"id":312}"#)
        .unwrap()
        .is_none());
}
