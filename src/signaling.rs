//! WebRTC signaling relay.
//!
//! The server forwards opaque SDP and ICE payloads between rooms without
//! inspecting them; media flows peer-to-peer once negotiation completes.
//! A frame without a target is dropped rather than guessed at.

use uuid::Uuid;

use crate::rooms::{RoomRouter, WsOutgoing};

#[derive(Debug, Clone)]
pub enum Signal {
    Offer(serde_json::Value),
    Answer(serde_json::Value),
    Ice(serde_json::Value),
}

/// Forward a signaling payload from `from` to `to`'s room, stamped with the
/// sender so the peer knows where to answer.
pub fn relay(router: &dyn RoomRouter, from: Uuid, to: Option<Uuid>, signal: Signal) {
    let Some(target) = to else {
        tracing::debug!(from = %from, "signaling frame without target dropped");
        return;
    };
    let event = match signal {
        Signal::Offer(offer) => WsOutgoing::WebrtcOffer { from, offer },
        Signal::Answer(answer) => WsOutgoing::WebrtcAnswer { from, answer },
        Signal::Ice(candidate) => WsOutgoing::WebrtcIce { from, candidate },
    };
    router.emit(target, event);
}
