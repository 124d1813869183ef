//! isu-engine — library crate, re-exported for integration tests in `tests/`
//! and shared between the binary's `main.rs` and its handlers.

pub mod adding_cache;
pub mod bigdecimal;
pub mod catalogue;
pub mod cli;
pub mod config;
pub mod errors;
pub mod jobs;
pub mod projector;
pub mod room_time;
pub mod routing;
pub mod session;
pub mod store;

use std::sync::Arc;

use adding_cache::AddingCache;
use room_time::RoomTimeGate;
use store::GameStore;

/// Shared application state passed to every handler.
pub struct AppState {
    pub store: Arc<dyn GameStore>,
    pub cache: Arc<AddingCache>,
    pub gate: Arc<RoomTimeGate>,
    pub config: config::Config,
}
