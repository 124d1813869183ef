//! Room-time gate: admission control enforcing that request timestamps
//! never run behind the server's wall clock or a room's own history.

use std::collections::HashMap;
use std::sync::Mutex;

/// Returns the current wall-clock time in milliseconds since epoch.
pub fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before UNIX_EPOCH")
        .as_millis() as i64
}

/// Process-wide `room -> last accepted wall-time`. Never shrinks; entries
/// live for the process lifetime.
#[derive(Default)]
pub struct RoomTimeGate {
    room_time: Mutex<HashMap<String, i64>>,
}

impl RoomTimeGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gate a request timestamp for `room`.
    ///
    /// Rejects if the wall clock has moved backwards relative to a prior
    /// accepted call for this room, or if `req_time != 0` and is in the
    /// past relative to the server's current time. On acceptance, records
    /// `now` as the room's new high-water mark and returns it — `req_time
    /// == 0` callers (status queries) use the returned value as "now".
    pub fn update(&self, room: &str, req_time: i64) -> Option<i64> {
        let mut room_time = self.room_time.lock().unwrap();
        let now = now_ms();

        if let Some(&prev) = room_time.get(room) {
            if now < prev {
                return None;
            }
        }
        if req_time != 0 && req_time < now {
            return None;
        }

        room_time.insert(room.to_string(), now);
        Some(now)
    }

    /// Drop all recorded room-time history (administrative reset).
    pub fn clear(&self) {
        self.room_time.lock().unwrap().clear();
    }
}
