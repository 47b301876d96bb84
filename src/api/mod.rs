//! HTTP + WebSocket surface.
//!
//! REST endpoints live under `/api/` behind bearer-token auth; the
//! WebSocket upgrade at `/ws/connect` is permissive (an invalid token
//! opens the transport but joins no room). Both surfaces call the same
//! transition functions.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;
pub mod websocket;

pub use error::ApiError;
pub use router::api_router;
pub use server::{start_server, ApiServer, ServerError};
pub use types::{ApiContext, TokenRegistry};
