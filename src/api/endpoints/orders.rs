//! Medicine order endpoints.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db::repository::{get_order, list_orders_for};
use crate::models::{Identity, MedicineOrder, Role};
use crate::orders::{self, ReviewRequest, StatusUpdateRequest, UploadRequest};

/// `POST /api/orders` — upload a prescription (patient).
pub async fn upload(
    State(ctx): State<ApiContext>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<UploadRequest>,
) -> Result<Json<MedicineOrder>, ApiError> {
    let conn = ctx.core.open_db()?;
    let order = orders::upload(&conn, &ctx.core.notifier(), identity, req)?;
    Ok(Json(order))
}

/// `POST /api/orders/:id/approve` — review, optionally forwarding
/// (neurologist).
pub async fn review(
    State(ctx): State<ApiContext>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReviewRequest>,
) -> Result<Json<MedicineOrder>, ApiError> {
    let conn = ctx.core.open_db()?;
    let order = orders::review(&conn, &ctx.core.notifier(), identity, &id, req)?;
    Ok(Json(order))
}

/// `POST /api/orders/:id/status` — fulfilment progress (bound supplier).
pub async fn update_status(
    State(ctx): State<ApiContext>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusUpdateRequest>,
) -> Result<Json<MedicineOrder>, ApiError> {
    let conn = ctx.core.open_db()?;
    let order = orders::update_status(&conn, &ctx.core.notifier(), identity, &id, req)?;
    Ok(Json(order))
}

/// `GET /api/orders` — role-scoped listing.
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<MedicineOrder>>, ApiError> {
    let conn = ctx.core.open_db()?;
    let orders = list_orders_for(&conn, &identity.user_id, identity.role)?;
    Ok(Json(orders))
}

/// `GET /api/orders/:id` — fetch one order with its timeline.
///
/// Participants only: the patient, the reviewing neurologist, the bound
/// supplier, or an admin.
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> Result<Json<MedicineOrder>, ApiError> {
    let conn = ctx.core.open_db()?;
    let order =
        get_order(&conn, &id)?.ok_or_else(|| ApiError::NotFound(format!("order {id}")))?;

    let me = identity.user_id;
    let participant = order.patient_id == me
        || order.neurologist_id == Some(me)
        || order.supplier_id == Some(me)
        || identity.role == Role::Admin
        || (identity.role == Role::Neurologist && order.neurologist_id.is_none());
    if !participant {
        return Err(ApiError::Forbidden("not a participant of this order".into()));
    }
    Ok(Json(order))
}
