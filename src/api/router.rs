//! Composable axum router.
//!
//! REST routes are nested under `/api/` behind the bearer-token auth
//! middleware; `/api/health` and the WebSocket upgrade are public.
//! Middleware reads `Extension<ApiContext>` (outermost layer), handlers
//! use `State<ApiContext>`.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Extension, Router};
use tower_http::cors::CorsLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::api::websocket;
use crate::core_state::CoreState;

pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

/// Build the router from a pre-constructed `ApiContext`. Used by tests
/// that need to issue tokens against the shared registry.
pub(crate) fn build_router(ctx: ApiContext) -> Router {
    let protected = Router::new()
        .route(
            "/appointments",
            post(endpoints::appointments::book).get(endpoints::appointments::list),
        )
        .route(
            "/appointments/:id/respond",
            post(endpoints::appointments::respond),
        )
        .route(
            "/appointments/:id/messages",
            post(endpoints::chat::post_message).get(endpoints::chat::list_messages),
        )
        .route(
            "/orders",
            post(endpoints::orders::upload).get(endpoints::orders::list),
        )
        .route("/orders/:id", get(endpoints::orders::detail))
        .route("/orders/:id/approve", post(endpoints::orders::review))
        .route("/orders/:id/status", post(endpoints::orders::update_status))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        .layer(Extension(ctx.clone()));

    let public = Router::new()
        .route("/health", get(endpoints::health::check))
        .with_state(ctx.clone());

    let ws = Router::new()
        .route("/ws/connect", get(websocket::ws_connect))
        .with_state(ctx);

    Router::new()
        .nest("/api", protected.merge(public))
        .merge(ws)
        .layer(CorsLayer::permissive())
}
