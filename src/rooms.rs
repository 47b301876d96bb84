//! Room router: maps live connections to per-user rooms.
//!
//! A room is the unit of real-time delivery, identified by a user id. A
//! user may hold zero, one, or many simultaneous connections (multi-device)
//! all joined to the same room. Membership is ephemeral and process-scoped:
//! rebuilt on connect, dropped on disconnect, never persisted.
//!
//! Delivery is best-effort, at-most-once per joined connection. Emitting to
//! an empty room is not an error: the entity store remains the source of
//! truth and clients recover missed events over REST.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::{Appointment, ChatMessage, MedicineOrder};

/// Server → client events, one event type per message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum WsOutgoing {
    #[serde(rename = "appointment:request")]
    AppointmentRequest { appointment: Appointment },
    #[serde(rename = "appointment:updated")]
    AppointmentUpdated { appointment: Appointment },
    #[serde(rename = "order:updated")]
    OrderUpdated { order: MedicineOrder },
    #[serde(rename = "chat:message")]
    ChatMessage {
        appointment_id: Uuid,
        message: ChatMessage,
    },
    #[serde(rename = "webrtc:offer")]
    WebrtcOffer {
        from: Uuid,
        offer: serde_json::Value,
    },
    #[serde(rename = "webrtc:answer")]
    WebrtcAnswer {
        from: Uuid,
        answer: serde_json::Value,
    },
    #[serde(rename = "webrtc:ice")]
    WebrtcIce {
        from: Uuid,
        candidate: serde_json::Value,
    },
}

/// Client → server events. Both the REST handlers and these frames reach
/// the same transition functions; frames carry no extra authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum WsIncoming {
    #[serde(rename = "appointment:respond")]
    AppointmentRespond { appointment_id: Uuid, accept: bool },
    #[serde(rename = "chat:message")]
    ChatMessage {
        appointment_id: Uuid,
        content: String,
    },
    #[serde(rename = "webrtc:offer")]
    WebrtcOffer {
        to: Option<Uuid>,
        offer: serde_json::Value,
    },
    #[serde(rename = "webrtc:answer")]
    WebrtcAnswer {
        to: Option<Uuid>,
        answer: serde_json::Value,
    },
    #[serde(rename = "webrtc:ice")]
    WebrtcIce {
        to: Option<Uuid>,
        candidate: serde_json::Value,
    },
}

/// Targeted emit surface handed to components that publish events.
///
/// Injected explicitly (never a process-wide singleton) so the dispatcher
/// is testable against a fake router.
pub trait RoomRouter: Send + Sync {
    /// Deliver an event to every connection joined to `room`.
    /// Returns the number of connections the event was handed to.
    fn emit(&self, room: Uuid, event: WsOutgoing) -> usize;
}

/// Live room membership: user id → send handles of joined connections.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<Uuid, Vec<(Uuid, mpsc::Sender<WsOutgoing>)>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join a connection to its user's room.
    pub fn join(&mut self, user_id: Uuid, conn_id: Uuid, tx: mpsc::Sender<WsOutgoing>) {
        self.rooms.entry(user_id).or_default().push((conn_id, tx));
    }

    /// Remove one connection; the room disappears with its last member.
    pub fn leave(&mut self, user_id: &Uuid, conn_id: &Uuid) {
        if let Some(members) = self.rooms.get_mut(user_id) {
            members.retain(|(id, _)| id != conn_id);
            if members.is_empty() {
                self.rooms.remove(user_id);
            }
        }
    }

    /// Best-effort fan-out to every connection in the room. `try_send`
    /// gives at-most-once: full or closed channels drop the event.
    pub fn emit(&self, room: &Uuid, event: &WsOutgoing) -> usize {
        let Some(members) = self.rooms.get(room) else {
            return 0;
        };
        let mut delivered = 0;
        for (conn_id, tx) in members {
            match tx.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::debug!(room = %room, conn = %conn_id, error = %e, "room emit dropped");
                }
            }
        }
        delivered
    }

    pub fn connection_count(&self, user_id: &Uuid) -> usize {
        self.rooms.get(user_id).map(|m| m.len()).unwrap_or(0)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

/// Shared, thread-safe handle to the registry; the production `RoomRouter`.
#[derive(Debug, Clone, Default)]
pub struct SharedRooms(Arc<RwLock<RoomRegistry>>);

impl SharedRooms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&self, user_id: Uuid, conn_id: Uuid, tx: mpsc::Sender<WsOutgoing>) {
        match self.0.write() {
            Ok(mut rooms) => rooms.join(user_id, conn_id, tx),
            Err(_) => tracing::error!("room registry lock poisoned on join"),
        }
    }

    pub fn leave(&self, user_id: &Uuid, conn_id: &Uuid) {
        match self.0.write() {
            Ok(mut rooms) => rooms.leave(user_id, conn_id),
            Err(_) => tracing::error!("room registry lock poisoned on leave"),
        }
    }

    pub fn connection_count(&self, user_id: &Uuid) -> usize {
        self.0.read().map(|r| r.connection_count(user_id)).unwrap_or(0)
    }
}

impl RoomRouter for SharedRooms {
    fn emit(&self, room: Uuid, event: WsOutgoing) -> usize {
        match self.0.read() {
            Ok(rooms) => {
                let delivered = rooms.emit(&room, &event);
                if delivered == 0 {
                    tracing::debug!(room = %room, "no connections joined, event dropped");
                }
                delivered
            }
            Err(_) => {
                tracing::error!("room registry lock poisoned on emit");
                0
            }
        }
    }
}
