//! Per-connection WebSocket dispatcher. One room has at most one live
//! session at a time; the reader task turns inbound frames into
//! [`GameRequest`]s over a channel, while the controller task multiplexes
//! that channel against a 500ms status ticker — mirroring the teacher's
//! `proxy::realtime::relay` split/select shape, but driving the game engine
//! instead of relaying bytes to an upstream.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::adding_cache::AddingCache;
use crate::bigdecimal;
use crate::catalogue;
use crate::projector;
use crate::room_time::RoomTimeGate;
use crate::store::GameStore;

const STATUS_TICK_MS: u64 = 500;

#[derive(Debug, Deserialize)]
struct GameRequest {
    request_id: i64,
    action: String,
    time: i64,
    isu: Option<String>,
    item_id: Option<i32>,
    count_bought: Option<i32>,
}

#[derive(Debug, Serialize)]
struct GameResponse {
    request_id: i64,
    is_success: bool,
}

/// Drive one room's WebSocket connection until the client disconnects or
/// sends something the protocol doesn't recognize.
pub async fn serve(
    ws: WebSocket,
    room: String,
    store: Arc<dyn GameStore>,
    cache: Arc<AddingCache>,
    gate: Arc<RoomTimeGate>,
) {
    let (mut sink, mut stream) = ws.split();

    let status = match projector::get_status(store.as_ref(), &cache, &gate, &room).await {
        Ok(status) => status,
        Err(e) => {
            tracing::warn!(room = %room, "serve: initial getStatus failed: {e}");
            return;
        }
    };
    if write_json(&mut sink, &status).await.is_err() {
        return;
    }

    let cancel = CancellationToken::new();
    let (tx, mut rx) = mpsc::channel::<GameRequest>(8);

    let reader_cancel = cancel.clone();
    let reader_room = room.clone();
    let reader = tokio::spawn(async move {
        let _guard = reader_cancel.clone().drop_guard();
        loop {
            let msg = tokio::select! {
                msg = stream.next() => msg,
                _ = reader_cancel.cancelled() => return,
            };
            let Some(Ok(msg)) = msg else { return };
            let Message::Text(text) = msg else { continue };
            let Ok(req) = serde_json::from_str::<GameRequest>(&text) else {
                tracing::warn!(room = %reader_room, "serve: malformed request: {text}");
                return;
            };
            if tx.send(req).await.is_err() {
                return;
            }
        }
    });

    let mut ticker = tokio::time::interval(std::time::Duration::from_millis(STATUS_TICK_MS));
    ticker.tick().await; // first tick fires immediately; skip it

    loop {
        tokio::select! {
            req = rx.recv() => {
                let Some(req) = req else { break };
                let success = match dispatch(&req, &room, store.as_ref(), &cache, &gate).await {
                    DispatchOutcome::UnknownAction => {
                        tracing::warn!(room = %room, action = %req.action, "serve: unrecognized action, terminating session");
                        break;
                    }
                    DispatchOutcome::Handled(success) => success,
                };

                if success {
                    match projector::get_status(store.as_ref(), &cache, &gate, &room).await {
                        Ok(status) => {
                            if write_json(&mut sink, &status).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(room = %room, "serve: getStatus after action failed: {e}");
                            break;
                        }
                    }
                }

                let resp = GameResponse { request_id: req.request_id, is_success: success };
                if write_json(&mut sink, &resp).await.is_err() {
                    break;
                }
            }
            _ = ticker.tick() => {
                match projector::get_status(store.as_ref(), &cache, &gate, &room).await {
                    Ok(status) => {
                        if write_json(&mut sink, &status).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(room = %room, "serve: periodic getStatus failed: {e}");
                        break;
                    }
                }
            }
            _ = cancel.cancelled() => break,
        }
    }

    cancel.cancel();
    reader.abort();
}

/// Outcome of dispatching one request: either the action was recognized (and
/// either succeeded or failed on its own terms), or the action itself is not
/// one the protocol knows — which must terminate the session, not just fail
/// the request.
enum DispatchOutcome {
    Handled(bool),
    UnknownAction,
}

async fn dispatch(
    req: &GameRequest,
    room: &str,
    store: &dyn GameStore,
    cache: &AddingCache,
    gate: &RoomTimeGate,
) -> DispatchOutcome {
    match req.action.as_str() {
        "addIsu" => {
            let Some(isu_str) = req.isu.as_deref() else {
                return DispatchOutcome::Handled(false);
            };
            if gate.update(room, req.time).is_none() {
                return DispatchOutcome::Handled(false);
            }
            let isu = bigdecimal::parse(isu_str);
            cache.add_isu(room, req.time, &isu);
            DispatchOutcome::Handled(true)
        }
        "buyItem" => {
            let (Some(item_id), Some(count_bought)) = (req.item_id, req.count_bought) else {
                return DispatchOutcome::Handled(false);
            };
            if catalogue::ITEMS.iter().all(|i| i.item_id != item_id) {
                return DispatchOutcome::Handled(false);
            }
            let success =
                crate::store::buy_item(store, cache, gate, room, item_id, count_bought, req.time)
                    .await;
            DispatchOutcome::Handled(success)
        }
        _ => DispatchOutcome::UnknownAction,
    }
}

async fn write_json<T: Serialize>(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    value: &T,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(value).expect("game wire types always serialize");
    sink.send(Message::Text(text.into())).await
}
