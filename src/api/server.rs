//! API server lifecycle: bind, spawn, graceful shutdown.
//!
//! Pattern: bind → spawn background task → return a handle carrying the
//! bound address and a oneshot shutdown channel.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::api::router::build_router;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Handle to a running API server.
pub struct ApiServer {
    pub addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl ApiServer {
    /// Signal the server to stop accepting connections and drain.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("API server shutdown signal sent");
        }
    }
}

impl Drop for ApiServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
}

/// Start the API server on `addr` (port 0 for ephemeral).
pub async fn start_server(core: Arc<CoreState>, addr: SocketAddr) -> Result<ApiServer, ServerError> {
    start_server_with_ctx(ApiContext::new(core), addr).await
}

/// Start from a pre-built `ApiContext`; integration tests use this to
/// issue tokens against the live registry.
pub async fn start_server_with_ctx(
    ctx: ApiContext,
    addr: SocketAddr,
) -> Result<ApiServer, ServerError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    let addr = listener
        .local_addr()
        .map_err(|source| ServerError::Bind { addr, source })?;

    let app = build_router(ctx);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
            tracing::info!("API server received shutdown signal");
        };

        tracing::info!(%addr, "API server started");
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
        {
            tracing::error!(error = %e, "API server error");
        }
        tracing::info!("API server stopped");
    });

    Ok(ApiServer {
        addr,
        shutdown_tx: Some(shutdown_tx),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appointments::{self, BookRequest};
    use crate::db::repository::{insert_user, list_chat_messages};
    use crate::models::{Role, User};
    use chrono::{NaiveDate, Utc};
    use futures_util::{SinkExt, StreamExt};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tokio_tungstenite::tungstenite::Message;
    use uuid::Uuid;

    struct TestServer {
        server: ApiServer,
        ctx: ApiContext,
        _dir: tempfile::TempDir,
    }

    type WsStream = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn start() -> TestServer {
        let dir = tempfile::tempdir().unwrap();
        let core = Arc::new(CoreState::new(dir.path().join("neurolink.db")));
        let ctx = ApiContext::new(core);
        let server = start_server_with_ctx(ctx.clone(), "127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        TestServer {
            server,
            ctx,
            _dir: dir,
        }
    }

    impl TestServer {
        fn seed(&self, role: Role, name: &str) -> (Uuid, String) {
            let id = Uuid::new_v4();
            let conn = self.ctx.core.open_db().unwrap();
            insert_user(
                &conn,
                &User {
                    id,
                    name: name.into(),
                    email: format!("{id}@example.org"),
                    role,
                    active: true,
                    created_at: Utc::now(),
                },
            )
            .unwrap();
            let token = self.ctx.tokens.lock().unwrap().issue(id, role);
            (id, token)
        }

        async fn connect(&self, token: Option<&str>) -> WsStream {
            let url = match token {
                Some(t) => format!("ws://{}/ws/connect?token={t}", self.server.addr),
                None => format!("ws://{}/ws/connect", self.server.addr),
            };
            let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
            // Give the server a moment to register the room join.
            tokio::time::sleep(Duration::from_millis(50)).await;
            stream
        }
    }

    async fn next_json(stream: &mut WsStream) -> Value {
        let msg = tokio::time::timeout(Duration::from_secs(2), stream.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream closed")
            .expect("ws error");
        match msg {
            Message::Text(text) => serde_json::from_str(&text).unwrap(),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    async fn assert_silent(stream: &mut WsStream) {
        let result = tokio::time::timeout(Duration::from_millis(200), stream.next()).await;
        assert!(result.is_err(), "expected no frame, got {result:?}");
    }

    #[tokio::test]
    async fn booking_reaches_connected_neurologist() {
        let ts = start().await;
        let (patient_id, _) = ts.seed(Role::Patient, "Ana");
        let (neuro_id, neuro_token) = ts.seed(Role::Neurologist, "Dr. Silva");
        let mut neuro_ws = ts.connect(Some(&neuro_token)).await;

        let conn = ts.ctx.core.open_db().unwrap();
        appointments::book(
            &conn,
            &ts.ctx.core.notifier(),
            crate::models::Identity {
                user_id: patient_id,
                role: Role::Patient,
            },
            BookRequest {
                neurologist_id: neuro_id,
                date: NaiveDate::from_ymd_opt(2025, 10, 7).unwrap(),
                time: "10:00 AM".into(),
                appointment_type: "Consultation".into(),
            },
        )
        .unwrap();

        let frame = next_json(&mut neuro_ws).await;
        assert_eq!(frame["event"], "appointment:request");
        assert_eq!(frame["appointment"]["status"], "pending");
    }

    #[tokio::test]
    async fn chat_frame_persists_and_echoes() {
        let ts = start().await;
        let (patient_id, patient_token) = ts.seed(Role::Patient, "Ana");
        let (neuro_id, neuro_token) = ts.seed(Role::Neurologist, "Dr. Silva");

        let conn = ts.ctx.core.open_db().unwrap();
        let appt = appointments::book(
            &conn,
            &ts.ctx.core.notifier(),
            crate::models::Identity {
                user_id: patient_id,
                role: Role::Patient,
            },
            BookRequest {
                neurologist_id: neuro_id,
                date: NaiveDate::from_ymd_opt(2025, 10, 7).unwrap(),
                time: "10:00 AM".into(),
                appointment_type: "Consultation".into(),
            },
        )
        .unwrap();

        let mut patient_ws = ts.connect(Some(&patient_token)).await;
        let mut neuro_ws = ts.connect(Some(&neuro_token)).await;

        patient_ws
            .send(Message::Text(
                json!({
                    "event": "chat:message",
                    "appointment_id": appt.id,
                    "content": "Hello doctor",
                })
                .to_string(),
            ))
            .await
            .unwrap();

        let frame = next_json(&mut neuro_ws).await;
        assert_eq!(frame["event"], "chat:message");
        assert_eq!(frame["message"]["content"], "Hello doctor");

        // Persisted, not just relayed.
        let stored = list_chat_messages(&conn, &appt.id).unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn webrtc_signaling_relays_between_peers() {
        let ts = start().await;
        let (_, caller_token) = ts.seed(Role::Patient, "Ana");
        let (callee_id, callee_token) = ts.seed(Role::Neurologist, "Dr. Silva");

        let mut caller_ws = ts.connect(Some(&caller_token)).await;
        let mut callee_ws = ts.connect(Some(&callee_token)).await;

        caller_ws
            .send(Message::Text(
                json!({
                    "event": "webrtc:offer",
                    "to": callee_id,
                    "offer": {"sdp": "v=0"},
                })
                .to_string(),
            ))
            .await
            .unwrap();

        let frame = next_json(&mut callee_ws).await;
        assert_eq!(frame["event"], "webrtc:offer");
        assert_eq!(frame["offer"]["sdp"], "v=0");
        assert!(frame["from"].is_string());
    }

    #[tokio::test]
    async fn unauthenticated_connection_opens_but_joins_no_room() {
        let ts = start().await;
        let (neuro_id, _) = ts.seed(Role::Neurologist, "Dr. Silva");

        let mut anon_ws = ts.connect(None).await;

        // Frames from the anonymous connection are dropped.
        anon_ws
            .send(Message::Text(
                json!({
                    "event": "webrtc:offer",
                    "to": neuro_id,
                    "offer": {"sdp": "v=0"},
                })
                .to_string(),
            ))
            .await
            .unwrap();

        // Events for real rooms never reach it.
        use crate::rooms::{RoomRouter, WsOutgoing};
        ts.ctx.core.rooms().emit(
            neuro_id,
            WsOutgoing::WebrtcIce {
                from: Uuid::new_v4(),
                candidate: json!({}),
            },
        );
        assert_silent(&mut anon_ws).await;
    }

    #[tokio::test]
    async fn malformed_frames_do_not_disconnect() {
        let ts = start().await;
        let (user_id, token) = ts.seed(Role::Patient, "Ana");
        let mut ws = ts.connect(Some(&token)).await;

        ws.send(Message::Text("not json at all".into())).await.unwrap();
        ws.send(Message::Text(json!({"event": "unknown:event"}).to_string()))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Still joined: a direct room emit arrives.
        use crate::rooms::{RoomRouter, WsOutgoing};
        ts.ctx.core.rooms().emit(
            user_id,
            WsOutgoing::WebrtcIce {
                from: Uuid::new_v4(),
                candidate: json!({"sdpMid": "0"}),
            },
        );
        let frame = next_json(&mut ws).await;
        assert_eq!(frame["event"], "webrtc:ice");
    }

    #[tokio::test]
    async fn disconnect_leaves_room() {
        let ts = start().await;
        let (user_id, token) = ts.seed(Role::Patient, "Ana");

        let ws = ts.connect(Some(&token)).await;
        assert_eq!(ts.ctx.core.rooms().connection_count(&user_id), 1);

        drop(ws);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(ts.ctx.core.rooms().connection_count(&user_id), 0);
    }

    #[tokio::test]
    async fn multi_device_fanout() {
        let ts = start().await;
        let (user_id, token) = ts.seed(Role::Patient, "Ana");

        let mut ws_a = ts.connect(Some(&token)).await;
        let mut ws_b = ts.connect(Some(&token)).await;

        use crate::rooms::{RoomRouter, WsOutgoing};
        ts.ctx.core.rooms().emit(
            user_id,
            WsOutgoing::WebrtcIce {
                from: Uuid::new_v4(),
                candidate: json!({}),
            },
        );

        assert_eq!(next_json(&mut ws_a).await["event"], "webrtc:ice");
        assert_eq!(next_json(&mut ws_b).await["event"], "webrtc:ice");
    }
}
