//! Appointment endpoints.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::appointments::{self, BookRequest};
use crate::db::repository::list_appointments_for;
use crate::models::{Appointment, Identity};

#[derive(Deserialize)]
pub struct RespondBody {
    pub accept: bool,
}

/// `POST /api/appointments` — book an appointment (patient).
pub async fn book(
    State(ctx): State<ApiContext>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<BookRequest>,
) -> Result<Json<Appointment>, ApiError> {
    let conn = ctx.core.open_db()?;
    let appointment = appointments::book(&conn, &ctx.core.notifier(), identity, req)?;
    Ok(Json(appointment))
}

/// `POST /api/appointments/:id/respond` — confirm or reject (neurologist).
pub async fn respond(
    State(ctx): State<ApiContext>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
    Json(body): Json<RespondBody>,
) -> Result<Json<Appointment>, ApiError> {
    let conn = ctx.core.open_db()?;
    let appointment =
        appointments::respond(&conn, &ctx.core.notifier(), identity, &id, body.accept)?;
    Ok(Json(appointment))
}

/// `GET /api/appointments` — role-scoped listing.
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<Appointment>>, ApiError> {
    let conn = ctx.core.open_db()?;
    let appointments = list_appointments_for(&conn, &identity.user_id, identity.role)?;
    Ok(Json(appointments))
}
