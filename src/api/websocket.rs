//! WebSocket layer: upgrade, room join, incoming frame dispatch.
//!
//! Connection lifecycle:
//! 1. Client opens `GET /ws/connect?token=xxx`.
//! 2. A valid token joins the connection to the user's room; an absent or
//!    invalid token still upgrades, but the connection belongs to no room
//!    and its frames carry no identity.
//! 3. Outbound events flow through a per-connection mpsc channel.
//! 4. Incoming frames dispatch into the same transition functions the REST
//!    handlers use; malformed frames are ignored without disconnecting.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::api::types::ApiContext;
use crate::appointments;
use crate::chat;
use crate::models::Identity;
use crate::rooms::{WsIncoming, WsOutgoing};
use crate::signaling::{self, Signal};

/// Outbound channel depth per connection; beyond this, events are dropped.
const OUTBOUND_BUFFER: usize = 64;

#[derive(Deserialize)]
pub struct WsConnectQuery {
    pub token: Option<String>,
}

/// `GET /ws/connect?token=…` — WebSocket upgrade.
///
/// Authentication is permissive: the transport always opens, identity
/// only decides room membership and frame authority.
pub async fn ws_connect(
    ws: WebSocketUpgrade,
    State(ctx): State<ApiContext>,
    Query(query): Query<WsConnectQuery>,
) -> impl IntoResponse {
    let identity = query.token.as_deref().and_then(|t| ctx.resolve_token(t));
    match &identity {
        Some(id) => tracing::info!(user = %id.user_id, "WebSocket upgrade accepted"),
        None => tracing::info!("WebSocket upgrade accepted (unauthenticated)"),
    }
    ws.on_upgrade(move |socket| handle_ws(socket, ctx, identity))
}

async fn handle_ws(socket: WebSocket, ctx: ApiContext, identity: Option<Identity>) {
    let (ws_sink, mut ws_stream) = socket.split();
    let (tx, rx) = mpsc::channel::<WsOutgoing>(OUTBOUND_BUFFER);

    let conn_id = Uuid::new_v4();
    let rooms = ctx.core.rooms();
    if let Some(id) = &identity {
        rooms.join(id.user_id, conn_id, tx.clone());
    }

    // Sender task: channel → socket.
    let sender_handle = tokio::spawn(async move {
        let mut sink = ws_sink;
        let mut rx = rx;
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(j) => j,
                Err(_) => continue,
            };
            if sink.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(msg) = ws_stream.next().await {
        match msg {
            Ok(Message::Text(ref text)) => match serde_json::from_str::<WsIncoming>(text) {
                Ok(incoming) => handle_incoming(&ctx, identity, incoming).await,
                Err(e) => tracing::debug!(error = %e, "ignoring malformed frame"),
            },
            Ok(Message::Close(_)) | Err(_) => break,
            _ => {}
        }
    }

    if let Some(id) = &identity {
        rooms.leave(&id.user_id, &conn_id);
    }
    drop(tx);
    let _ = sender_handle.await;
}

/// Dispatch one incoming frame. Frames from unauthenticated connections
/// are dropped; operational failures are logged, never fatal to the
/// connection.
async fn handle_incoming(ctx: &ApiContext, identity: Option<Identity>, incoming: WsIncoming) {
    let Some(actor) = identity else {
        tracing::debug!("dropping frame from unauthenticated connection");
        return;
    };

    match incoming {
        WsIncoming::AppointmentRespond {
            appointment_id,
            accept,
        } => {
            with_db(ctx, move |conn, notifier| {
                appointments::respond(conn, notifier, actor, &appointment_id, accept).map(|_| ())
            })
            .await
        }
        WsIncoming::ChatMessage {
            appointment_id,
            content,
        } => {
            with_db(ctx, move |conn, notifier| {
                chat::post_message(conn, notifier, actor, &appointment_id, &content).map(|_| ())
            })
            .await
        }
        WsIncoming::WebrtcOffer { to, offer } => {
            signaling::relay(&ctx.core.rooms(), actor.user_id, to, Signal::Offer(offer));
        }
        WsIncoming::WebrtcAnswer { to, answer } => {
            signaling::relay(&ctx.core.rooms(), actor.user_id, to, Signal::Answer(answer));
        }
        WsIncoming::WebrtcIce { to, candidate } => {
            signaling::relay(&ctx.core.rooms(), actor.user_id, to, Signal::Ice(candidate));
        }
    }
}

/// Run a transition on a blocking worker. Opening the connection and the
/// transition itself are synchronous rusqlite work; under write contention
/// SQLite's busy handler can hold the thread for the full busy timeout,
/// which must not stall the runtime's worker threads.
async fn with_db<F>(ctx: &ApiContext, f: F)
where
    F: FnOnce(&rusqlite::Connection, &crate::notify::Notifier) -> Result<(), crate::error::DomainError>
        + Send
        + 'static,
{
    let core = Arc::clone(&ctx.core);
    let done = tokio::task::spawn_blocking(move || {
        let conn = match core.open_db() {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "cannot open database for frame");
                return;
            }
        };
        let notifier = core.notifier();
        if let Err(e) = f(&conn, &notifier) {
            tracing::debug!(error = %e, "frame rejected");
        }
    });
    if let Err(e) = done.await {
        tracing::error!(error = %e, "frame task failed");
    }
}
