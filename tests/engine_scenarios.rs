//! End-to-end scenarios against the in-process engine (no database): the
//! literal S1-S6 walkthroughs.

use isu_engine::adding_cache::AddingCache;
use isu_engine::bigdecimal::Exponential;
use isu_engine::projector::{calc_status, get_status};
use isu_engine::room_time::{now_ms, RoomTimeGate};
use isu_engine::store::{buy_item, Buying, GameStore, InMemoryGameStore};
use num_bigint::BigInt;

#[tokio::test]
async fn s1_single_add_appears_in_adding_and_schedule() {
    let cache = AddingCache::new();
    let gate = RoomTimeGate::new();
    let now = gate.update("A", 0).unwrap();

    cache.add_isu("A", now + 100, &BigInt::from(100));

    let status = calc_status(&cache, "A", now, &[]);
    assert_eq!(status.adding.len(), 1);
    assert_eq!(status.adding[0], isu_engine::projector::WireAdding { time: now + 100, isu: "100".into() });
    assert!(status.items.iter().all(|i| i.count_bought == 0));

    let base = status.schedule.iter().find(|s| s.time == now).unwrap();
    assert_eq!(base.milli_isu, Exponential { mantissa: 0, exponent: 0 });
    assert_eq!(base.total_power, Exponential { mantissa: 0, exponent: 0 });

    let jump = status.schedule.iter().find(|s| s.time == now + 100).unwrap();
    assert_eq!(jump.milli_isu, Exponential { mantissa: 100_000, exponent: 0 });
}

#[tokio::test]
async fn s2_buy_too_poor_fails_and_leaves_no_row() {
    let store = InMemoryGameStore::new();
    let cache = AddingCache::new();
    let gate = RoomTimeGate::new();
    let now = now_ms();

    let ok = buy_item(&store, &cache, &gate, "B", 1, 0, now).await;
    assert!(!ok);
    assert!(store.list_buyings("B").await.unwrap().is_empty());
}

#[tokio::test]
async fn s3_buy_succeeds_once_enough_isu_has_accrued() {
    let store = InMemoryGameStore::new();
    let cache = AddingCache::new();
    let gate = RoomTimeGate::new();
    let now = now_ms();

    // item 1's first unit costs price(1) = 2 isu (see catalogue tests); seed
    // 10 isu well outside the 1s absorption window so it's all in `total`.
    cache.add_isu("C", now - 5_000, &BigInt::from(10));
    cache.get_total("C", now);

    let ok = buy_item(&store, &cache, &gate, "C", 1, 0, now).await;
    assert!(ok);

    let status = get_status(&store, &cache, &gate, "C").await.unwrap();
    let item1 = status.items.iter().find(|i| i.item_id == 1).unwrap();
    assert_eq!(item1.count_bought, 1);
}

#[tokio::test]
async fn s4_duplicate_ordinal_is_rejected_on_immediate_retry() {
    let store = InMemoryGameStore::new();
    let cache = AddingCache::new();
    let gate = RoomTimeGate::new();
    let now = now_ms();

    cache.add_isu("D4", now - 5_000, &BigInt::from(10));
    cache.get_total("D4", now);

    assert!(buy_item(&store, &cache, &gate, "D4", 1, 0, now).await);
    assert!(!buy_item(&store, &cache, &gate, "D4", 1, 0, now).await);
}

#[tokio::test]
async fn s5_future_build_is_unbuilt_now_and_jumps_power_at_its_build_time() {
    let cache = AddingCache::new();
    let now = now_ms();
    let buyings = vec![Buying { item_id: 1, ordinal: 1, time: now + 500 }];

    let status = calc_status(&cache, "D", now, &buyings);
    let item1 = status.items.iter().find(|i| i.item_id == 1).unwrap();
    assert_eq!(item1.count_built, 0);
    assert_eq!(item1.building.len(), 1);
    assert_eq!(item1.building[0].time, now + 500);

    let jump = status.schedule.iter().find(|s| s.time == now + 500).unwrap();
    assert_eq!(jump.total_power, Exponential { mantissa: 1, exponent: 0 });
}

#[test]
fn s6_item_thirteen_power_at_ten_exceeds_fifteen_digits_on_the_wire() {
    let power = isu_engine::catalogue::item(13).power(10);
    let digits = power.to_string();
    assert!(digits.len() > 15);

    let exp = isu_engine::bigdecimal::to_exp(&power);
    assert!(exp.exponent > 0);
    let first_fifteen: i64 = digits[..15].parse().unwrap();
    assert_eq!(exp.mantissa, first_fifteen);
}
