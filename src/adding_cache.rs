//! In-memory, process-wide cache of scheduled isu adds.
//!
//! One mutex guards both the pending-event queue and the per-room absorbed
//! total, because [`AddingCache::get_total`] reads and mutates both together
//! — splitting them across two locks (or sharding with `DashMap`) would open
//! a window where a concurrent snapshot or add sees a torn state.

use std::collections::HashMap;
use std::sync::Mutex;

use num_bigint::BigInt;
use num_traits::Zero;

/// A future credit of isu scheduled at a specific instant.
#[derive(Debug, Clone)]
pub struct Adding {
    pub time: i64,
    pub isu: BigInt,
}

#[derive(Default)]
struct Inner {
    /// room -> (time -> isu), only events with `time > now - 1000`.
    que: HashMap<String, HashMap<i64, BigInt>>,
    /// room -> absorbed MilliIsu total.
    total: HashMap<String, BigInt>,
}

/// Process-wide adding cache. Cheap to clone (wraps an `Arc`-free `Mutex`
/// behind a reference in practice — callers hold it in an `Arc<AddingCache>`
/// the way the teacher holds `Arc<AppState>`).
#[derive(Default)]
pub struct AddingCache {
    inner: Mutex<Inner>,
}

impl AddingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `isu` at `(room, time)`. Multiple calls for the same pair sum.
    pub fn add_isu(&self, room: &str, time: i64, isu: &BigInt) {
        let mut inner = self.inner.lock().unwrap();
        let bucket = inner.que.entry(room.to_string()).or_default();
        let slot = bucket.entry(time).or_insert_with(BigInt::zero);
        *slot += isu;
    }

    /// Expired-plus-pending MilliIsu as of `req_time`.
    ///
    /// Events with `time <= req_time - 1000` are absorbed into `total` and
    /// removed. Events with `req_time - 1000 < time <= req_time` are
    /// included in the returned sum but left in the queue — they are still
    /// inside the 1-second window where the projector needs to see them
    /// individually. Events with `time > req_time` are ignored.
    pub fn get_total(&self, room: &str, req_time: i64) -> BigInt {
        let mut inner = self.inner.lock().unwrap();
        let total = inner.total.entry(room.to_string()).or_insert_with(BigInt::zero);
        let bucket = inner.que.entry(room.to_string()).or_default();

        let mut pending = BigInt::zero();
        let mut expired = Vec::new();
        for (&time, isu) in bucket.iter() {
            if time <= req_time - 1000 {
                *total += isu * 1000;
                expired.push(time);
            } else if time <= req_time {
                pending += isu * 1000;
            }
        }
        for time in expired {
            bucket.remove(&time);
        }

        &*total + pending
    }

    /// Every queued event of `room` strictly after `current_time`, keyed by
    /// time — the future-adding schedule the projector simulates forward.
    pub fn set_adding_at(&self, room: &str, current_time: i64, out: &mut HashMap<i64, Adding>) {
        let inner = self.inner.lock().unwrap();
        if let Some(bucket) = inner.que.get(room) {
            for (&time, isu) in bucket.iter() {
                if time > current_time {
                    out.insert(time, Adding { time, isu: isu.clone() });
                }
            }
        }
    }

    /// Consistent clone of both maps, decimal-encoded, for the snapshotter.
    /// Takes the mutex only for the clone; all CSV I/O happens after release.
    pub(crate) fn snapshot(&self) -> (Vec<(String, i64, String)>, Vec<(String, String)>) {
        let inner = self.inner.lock().unwrap();
        let que = inner
            .que
            .iter()
            .flat_map(|(room, bucket)| {
                bucket
                    .iter()
                    .map(move |(&time, isu)| (room.clone(), time, isu.to_string()))
            })
            .collect();
        let total = inner
            .total
            .iter()
            .map(|(room, v)| (room.clone(), v.to_string()))
            .collect();
        (que, total)
    }

    /// Restore state from a snapshot (startup crash recovery). Replaces
    /// whatever is currently cached — only called before the server starts
    /// accepting connections.
    pub(crate) fn restore(&self, que: Vec<(String, i64, String)>, total: Vec<(String, String)>) {
        let mut inner = self.inner.lock().unwrap();
        for (room, time, isu) in que {
            inner
                .que
                .entry(room)
                .or_default()
                .insert(time, crate::bigdecimal::parse(&isu));
        }
        for (room, v) in total {
            inner.total.insert(room, crate::bigdecimal::parse(&v));
        }
    }

    /// Clear all cached state (administrative reset).
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.que.clear();
        inner.total.clear();
    }
}
