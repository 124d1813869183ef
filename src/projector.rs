//! Status projector: `calcStatus` forward-simulates one second of game state
//! and `getStatus` wraps it with the room-time gate and a fresh timestamp.

use std::collections::{HashMap, HashSet};

use num_bigint::BigInt;
use num_traits::Zero;
use serde::Serialize;

use crate::adding_cache::{Adding, AddingCache};
use crate::bigdecimal::{to_exp, Exponential};
use crate::catalogue;
use crate::room_time::{self, RoomTimeGate};
use crate::store::{Buying, GameStore};

/// One second, in milliseconds — the forward-simulation horizon.
const SIMULATION_WINDOW_MS: i64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WireAdding {
    pub time: i64,
    pub isu: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Schedule {
    pub time: i64,
    pub milli_isu: Exponential,
    pub total_power: Exponential,
}

#[derive(Debug, Clone, Serialize)]
pub struct Building {
    pub time: i64,
    pub count_built: i32,
    pub power: Exponential,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemStatus {
    pub item_id: i32,
    pub count_bought: i32,
    pub count_built: i32,
    pub next_price: Exponential,
    pub power: Exponential,
    pub building: Vec<Building>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OnSale {
    pub item_id: i32,
    pub time: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GameStatus {
    pub time: i64,
    pub adding: Vec<WireAdding>,
    pub schedule: Vec<Schedule>,
    pub items: Vec<ItemStatus>,
    pub on_sale: Vec<OnSale>,
}

/// `getStatus(room)`: read the purchase ledger, project forward, and return
/// a status anchored at a freshly-read timestamp.
pub async fn get_status(
    store: &dyn GameStore,
    cache: &AddingCache,
    gate: &RoomTimeGate,
    room: &str,
) -> anyhow::Result<GameStatus> {
    let current_time = gate
        .update(room, 0)
        .ok_or_else(|| anyhow::anyhow!("room-time gate rejected status query for {room}"))?;
    let buyings = store.list_buyings(room).await?;
    let mut status = calc_status(cache, room, current_time, &buyings);

    // calc_status can take non-trivial wall time; re-stamp right before
    // handing the status back to the caller.
    status.time = room_time::now_ms();
    Ok(status)
}

/// `calcStatus(room, currentTime, catalogue, buyings)`: pure projection over
/// an immutable snapshot of purchases plus the adding cache's current state.
pub fn calc_status(cache: &AddingCache, room: &str, current_time: i64, buyings: &[Buying]) -> GameStatus {
    let mut total_milli_isu = cache.get_total(room, current_time);
    let mut total_power = BigInt::zero();

    let mut item_power: HashMap<i32, BigInt> = HashMap::new();
    let mut item_built: HashMap<i32, i32> = HashMap::new();
    let mut item_bought: HashMap<i32, i32> = HashMap::new();
    let mut item_building: HashMap<i32, Vec<Building>> = HashMap::new();
    let mut item_power0: HashMap<i32, Exponential> = HashMap::new();
    let mut item_built0: HashMap<i32, i32> = HashMap::new();

    let mut adding_at: HashMap<i64, Adding> = HashMap::new();
    let mut buying_at: HashMap<i64, Vec<Buying>> = HashMap::new();

    for item in catalogue::ITEMS.iter() {
        item_power.insert(item.item_id, BigInt::zero());
        item_building.insert(item.item_id, Vec::new());
    }

    cache.set_adding_at(room, current_time, &mut adding_at);

    // Step A: baseline at current_time.
    for &b in buyings {
        let bought = item_bought.entry(b.item_id).or_insert(0);
        *bought += 1;
        let bought = *bought;

        let item = catalogue::item(b.item_id);
        total_milli_isu -= item.price(b.ordinal as i64) * 1000;

        if b.time <= current_time {
            let built = item_built.entry(b.item_id).or_insert(0);
            *built += 1;
            let power = item.power(bought as i64);
            total_milli_isu += &power * (current_time - b.time);
            total_power += &power;
            *item_power.get_mut(&b.item_id).unwrap() += power;
        } else {
            buying_at.entry(b.time).or_default().push(b);
        }
    }

    // Step B: snapshot the item view as of current_time, then compute next
    // price and whether each item is on-sale right now (time 0 sentinel).
    let mut item_price: HashMap<i32, BigInt> = HashMap::new();
    let mut item_price1000: HashMap<i32, BigInt> = HashMap::new();
    let mut item_on_sale: HashMap<i32, i64> = HashMap::new();

    for item in catalogue::ITEMS.iter() {
        item_power0.insert(item.item_id, to_exp(item_power.get(&item.item_id).unwrap()));
        item_built0.insert(item.item_id, *item_built.get(&item.item_id).unwrap_or(&0));

        let bought = *item_bought.get(&item.item_id).unwrap_or(&0);
        let price = item.price((bought + 1) as i64);
        let price1000 = &price * 1000;
        if total_milli_isu >= price1000 {
            item_on_sale.insert(item.item_id, 0);
        }
        item_price.insert(item.item_id, price);
        item_price1000.insert(item.item_id, price1000);
    }

    // Step C: seed the schedule.
    let mut schedule = vec![Schedule {
        time: current_time,
        milli_isu: to_exp(&total_milli_isu),
        total_power: to_exp(&total_power),
    }];

    // Step D: forward-simulate one tick at a time to current_time + 1000.
    for t in (current_time + 1)..=(current_time + SIMULATION_WINDOW_MS) {
        total_milli_isu += &total_power;
        let mut updated = false;

        if let Some(a) = adding_at.get(&t) {
            total_milli_isu += &a.isu * 1000;
            updated = true;
        }

        if let Some(bs) = buying_at.get(&t) {
            updated = true;
            let mut touched: HashSet<i32> = HashSet::new();
            for b in bs {
                let item = catalogue::item(b.item_id);
                touched.insert(b.item_id);
                *item_built.entry(b.item_id).or_insert(0) += 1;
                let power = item.power(b.ordinal as i64);
                *item_power.get_mut(&b.item_id).unwrap() += &power;
                total_power += power;
            }
            for id in touched {
                item_building.get_mut(&id).unwrap().push(Building {
                    time: t,
                    count_built: *item_built.get(&id).unwrap(),
                    power: to_exp(item_power.get(&id).unwrap()),
                });
            }
        }

        if updated {
            schedule.push(Schedule {
                time: t,
                milli_isu: to_exp(&total_milli_isu),
                total_power: to_exp(&total_power),
            });
        }

        for item in catalogue::ITEMS.iter() {
            if item_on_sale.contains_key(&item.item_id) {
                continue;
            }
            if total_milli_isu >= *item_price1000.get(&item.item_id).unwrap() {
                item_on_sale.insert(item.item_id, t);
            }
        }
    }

    // Step E: assemble output. Top-level array order carries no meaning.
    let adding: Vec<WireAdding> = adding_at
        .values()
        .map(|a| WireAdding { time: a.time, isu: a.isu.to_string() })
        .collect();

    let items: Vec<ItemStatus> = catalogue::ITEMS
        .iter()
        .map(|item| ItemStatus {
            item_id: item.item_id,
            count_bought: *item_bought.get(&item.item_id).unwrap_or(&0),
            count_built: *item_built0.get(&item.item_id).unwrap_or(&0),
            next_price: to_exp(item_price.get(&item.item_id).unwrap()),
            power: *item_power0.get(&item.item_id).unwrap(),
            building: item_building.get(&item.item_id).cloned().unwrap_or_default(),
        })
        .collect();

    let on_sale: Vec<OnSale> = item_on_sale
        .iter()
        .map(|(&item_id, &time)| OnSale { item_id, time })
        .collect();

    GameStatus {
        time: current_time,
        adding,
        schedule,
        items,
        on_sale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room_time::now_ms;

    #[test]
    fn empty_room_has_zero_totals_and_everything_unbuilt() {
        let cache = AddingCache::new();
        let now = now_ms();
        let status = calc_status(&cache, "empty", now, &[]);

        assert_eq!(status.schedule[0].milli_isu, Exponential { mantissa: 0, exponent: 0 });
        assert!(status.items.iter().all(|i| i.count_bought == 0 && i.count_built == 0));
    }

    #[test]
    fn a_future_add_appears_in_adding_and_creates_a_schedule_jump() {
        let cache = AddingCache::new();
        let now = now_ms();
        cache.add_isu("room", now + 100, &BigInt::from(100));

        let status = calc_status(&cache, "room", now, &[]);

        assert_eq!(status.adding.len(), 1);
        assert_eq!(status.adding[0].time, now + 100);
        assert_eq!(status.adding[0].isu, "100");

        let jump = status
            .schedule
            .iter()
            .find(|s| s.time == now + 100)
            .expect("schedule should contain the tick the add landed on");
        assert_eq!(jump.milli_isu, Exponential { mantissa: 100_000, exponent: 0 });
    }

    #[test]
    fn a_built_purchase_contributes_power_and_count_built() {
        let cache = AddingCache::new();
        let now = now_ms();
        let buyings = vec![Buying { item_id: 1, ordinal: 1, time: now - 10 }];

        let status = calc_status(&cache, "room", now, &buyings);
        let item1 = status.items.iter().find(|i| i.item_id == 1).unwrap();
        assert_eq!(item1.count_bought, 1);
        assert_eq!(item1.count_built, 1);
        assert_eq!(item1.power, Exponential { mantissa: 1, exponent: 0 });
    }

    #[test]
    fn a_future_buy_is_unbuilt_now_but_builds_within_the_window() {
        let cache = AddingCache::new();
        let now = now_ms();
        let buyings = vec![Buying { item_id: 1, ordinal: 1, time: now + 500 }];

        let status = calc_status(&cache, "room", now, &buyings);
        let item1 = status.items.iter().find(|i| i.item_id == 1).unwrap();
        assert_eq!(item1.count_built, 0, "not built yet at current_time");
        assert_eq!(item1.building.len(), 1);
        assert_eq!(item1.building[0].time, now + 500);

        let jump = status
            .schedule
            .iter()
            .find(|s| s.time == now + 500)
            .expect("building should create a schedule entry at its build time");
        assert_eq!(jump.total_power, Exponential { mantissa: 1, exponent: 0 });
    }

    #[test]
    fn on_sale_is_recorded_at_the_zero_sentinel_when_already_affordable() {
        let cache = AddingCache::new();
        let now = now_ms();
        // Item 1 built long ago has produced far more than its own next
        // price (2 isu) by now, so it should already be on-sale at time 0.
        let buyings = vec![Buying { item_id: 1, ordinal: 1, time: now - 1_000_000 }];
        let status = calc_status(&cache, "room", now, &buyings);

        let on_sale_1 = status.on_sale.iter().find(|o| o.item_id == 1);
        assert_eq!(on_sale_1.map(|o| o.time), Some(0));
    }

    #[test]
    fn projection_is_deterministic_for_identical_inputs() {
        let cache_a = AddingCache::new();
        let cache_b = AddingCache::new();
        let now = now_ms();
        cache_a.add_isu("room", now + 10, &BigInt::from(5));
        cache_b.add_isu("room", now + 10, &BigInt::from(5));
        let buyings = vec![Buying { item_id: 1, ordinal: 1, time: now - 10 }];

        let a = calc_status(&cache_a, "room", now, &buyings);
        let b = calc_status(&cache_b, "room", now, &buyings);

        assert_eq!(a.schedule.len(), b.schedule.len());
        for (sa, sb) in a.schedule.iter().zip(b.schedule.iter()) {
            assert_eq!(sa.milli_isu, sb.milli_isu);
            assert_eq!(sa.total_power, sb.total_power);
        }
    }
}
