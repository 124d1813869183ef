//! Room-to-host sharding: pins a room name to one host by hash, the way a
//! real multi-host deployment would route a client's WebSocket connection.
//! The engine itself is still single-process; this only reproduces the
//! advertised routing contract (`GET /room/{room_name}`) clients rely on.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crate::AppState;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// FNV-1a 32-bit hash, matching the original's `hash/fnv.New32a()`.
fn fnv1a32(s: &str) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in s.as_bytes() {
        hash ^= *byte as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Pick the host a room is pinned to. Panics if `hosts` is empty — callers
/// always configure at least one host.
pub fn shard_host<'a>(room_name: &str, hosts: &'a [String]) -> &'a str {
    assert!(!hosts.is_empty(), "room routing requires at least one host");
    let idx = (fnv1a32(room_name) as usize) % hosts.len();
    &hosts[idx]
}

#[derive(Debug, Serialize)]
pub struct RoomLocation {
    host: String,
    path: String,
}

/// `GET /room/{room_name}`: tell the client which host and WebSocket path to
/// connect to for this room.
pub async fn room_handler(
    State(state): State<Arc<AppState>>,
    Path(room_name): Path<String>,
) -> Json<RoomLocation> {
    let host = shard_host(&room_name, &state.config.room_hosts).to_string();
    let path = format!("/ws/{}", urlencoding::encode(&room_name));
    Json(RoomLocation { host, path })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_room_name_always_maps_to_the_same_host() {
        let hosts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let first = shard_host("room-42", &hosts);
        let second = shard_host("room-42", &hosts);
        assert_eq!(first, second);
    }

    #[test]
    fn single_host_always_wins() {
        let hosts = vec!["only".to_string()];
        assert_eq!(shard_host("anything", &hosts), "only");
    }

    #[test]
    fn distributes_across_hosts() {
        let hosts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let mut seen = std::collections::HashSet::new();
        for i in 0..100 {
            seen.insert(shard_host(&format!("room-{i}"), &hosts));
        }
        assert!(seen.len() > 1, "100 distinct rooms should not all land on one host");
    }

    #[test]
    fn path_escaping_leaves_ascii_alphanumerics_alone() {
        assert_eq!(urlencoding::encode("room42").as_ref(), "room42");
    }

    #[test]
    fn path_escaping_percent_encodes_spaces_and_slashes() {
        assert_eq!(urlencoding::encode("a room/b").as_ref(), "a%20room%2Fb");
    }
}
