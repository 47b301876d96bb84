//! Appointment chat endpoints.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::chat;
use crate::db::repository::MessageView;
use crate::models::{ChatMessage, Identity};

#[derive(Deserialize)]
pub struct PostMessageBody {
    pub content: String,
}

/// `POST /api/appointments/:id/messages` — send a message (participant).
pub async fn post_message(
    State(ctx): State<ApiContext>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
    Json(body): Json<PostMessageBody>,
) -> Result<Json<ChatMessage>, ApiError> {
    let conn = ctx.core.open_db()?;
    let message = chat::post_message(&conn, &ctx.core.notifier(), identity, &id, &body.content)?;
    Ok(Json(message))
}

/// `GET /api/appointments/:id/messages` — history, oldest first.
pub async fn list_messages(
    State(ctx): State<ApiContext>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<MessageView>>, ApiError> {
    let conn = ctx.core.open_db()?;
    let messages = chat::list_messages(&conn, identity, &id)?;
    Ok(Json(messages))
}
