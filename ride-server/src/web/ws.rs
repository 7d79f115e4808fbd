//! WebSocket sessions.
//!
//! A rider or captain connects once and receives every event addressed to
//! their room. Captains may also stream their position over the socket
//! instead of posting it.

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::HeaderMap,
    response::Response,
};
use futures::{SinkExt, StreamExt};

use crate::domain::{Actor, CaptainId};
use crate::realtime::Room;

use super::dto::{LocationRequest, SessionQuery};
use super::routes::{AppError, actor_from_headers, parse_actor};
use super::state::AppState;

/// Upgrade to a session for the actor named by the header or `?actor=`.
pub(super) async fn session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SessionQuery>,
    upgrade: WebSocketUpgrade,
) -> Result<Response, AppError> {
    let actor = match &query.actor {
        Some(raw) => parse_actor(raw)?,
        None => actor_from_headers(&headers)?,
    };
    let room = Room::for_actor(&actor).ok_or_else(|| AppError::Forbidden {
        message: format!("{actor} has no session room"),
    })?;
    Ok(upgrade.on_upgrade(move |socket| relay(state, actor, room, socket)))
}

async fn relay(state: AppState, actor: Actor, room: Room, socket: WebSocket) {
    let mut subscription = state.registry.subscribe(room);
    let (mut sink, mut stream) = socket.split();
    tracing::info!(%actor, "Session connected");

    loop {
        tokio::select! {
            outbound = subscription.receiver.recv() => {
                let Some(text) = outbound else { break };
                if sink.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => handle_client_message(&state, &actor, &text).await,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(%actor, error = %e, "Session read failed");
                        break;
                    }
                }
            }
        }
    }

    state.registry.unsubscribe(room, subscription.id);
    tracing::info!(%actor, "Session closed");
}

async fn handle_client_message(state: &AppState, actor: &Actor, text: &str) {
    let Actor::Captain(captain) = actor else {
        tracing::debug!(%actor, "Ignoring message from non-captain session");
        return;
    };
    match serde_json::from_str::<LocationRequest>(text) {
        Ok(req) => stream_location(state, *captain, req).await,
        Err(e) => tracing::debug!(%captain, error = %e, "Unrecognised session message"),
    }
}

async fn stream_location(state: &AppState, captain: CaptainId, req: LocationRequest) {
    if let Err(e) = state
        .dispatcher
        .update_location(captain, req.location)
        .await
    {
        tracing::warn!(%captain, error = %e, "Location update from session failed");
    }
}
