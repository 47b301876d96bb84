//! Medicine order lifecycle: patient upload, neurologist review, supplier
//! fulfilment.
//!
//! Review transitions (`uploaded → doctor_approved → forwarded_to_supplier`,
//! or `rejected`) use a closed vocabulary; once an order is with its
//! supplier the status becomes free-form progress text. Every transition
//! appends one timeline entry in the same transaction as the status write.

use chrono::Utc;
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::repository::{
    append_timeline, approve_order_row, forward_order_row, get_order, get_user_with_role,
    insert_order, reject_order_row, supplier_update_row,
};
use crate::error::DomainError;
use crate::models::{Identity, MedicineOrder, OrderStatus, Role};
use crate::notify::Notifier;
use crate::rooms::WsOutgoing;

#[derive(Debug, Clone, Deserialize)]
pub struct UploadRequest {
    pub file_ref: String,
    pub delivery_address: String,
}

/// Neurologist review decision. `supplier_id` may accompany an approval to
/// forward the prescription in the same step.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewRequest {
    pub approve: bool,
    #[serde(default)]
    pub supplier_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: String,
    #[serde(default)]
    pub note: Option<String>,
}

/// Upload a prescription. Patient-only; the order starts `uploaded` with a
/// single timeline entry.
pub fn upload(
    conn: &Connection,
    notifier: &Notifier,
    actor: Identity,
    req: UploadRequest,
) -> Result<MedicineOrder, DomainError> {
    if actor.role != Role::Patient {
        return Err(DomainError::Forbidden(
            "only patients can upload prescriptions".into(),
        ));
    }
    if req.file_ref.trim().is_empty() || req.delivery_address.trim().is_empty() {
        return Err(DomainError::Validation(
            "file reference and delivery address are required".into(),
        ));
    }

    let now = Utc::now();
    let order = MedicineOrder {
        id: Uuid::new_v4(),
        patient_id: actor.user_id,
        neurologist_id: None,
        supplier_id: None,
        file_ref: req.file_ref,
        delivery_address: req.delivery_address,
        status: OrderStatus::Uploaded,
        timeline: vec![],
        created_at: now,
        updated_at: now,
    };

    let tx = conn.unchecked_transaction()?;
    insert_order(&tx, &order)?;
    append_timeline(&tx, &order.id, &OrderStatus::Uploaded, None, now)?;
    tx.commit()?;

    let order = hydrate(conn, &order.id)?;
    tracing::info!(order = %order.id, "prescription uploaded");
    notifier.dispatch(
        order.patient_id,
        WsOutgoing::OrderUpdated {
            order: order.clone(),
        },
    );
    Ok(order)
}

/// Review an uploaded order. Neurologist-only.
///
/// Approval binds the reviewing neurologist; with a `supplier_id` it also
/// forwards in the same transaction. An already-approved order can still be
/// forwarded by a later call carrying a supplier. Rejection is terminal.
pub fn review(
    conn: &Connection,
    notifier: &Notifier,
    actor: Identity,
    order_id: &Uuid,
    req: ReviewRequest,
) -> Result<MedicineOrder, DomainError> {
    if actor.role != Role::Neurologist {
        return Err(DomainError::Forbidden(
            "only neurologists can review orders".into(),
        ));
    }
    let order = get_order(conn, order_id)?
        .ok_or_else(|| DomainError::not_found("order", order_id))?;
    let now = Utc::now();

    if !req.approve {
        if !order.status.is_reviewable() {
            return Err(DomainError::Conflict(format!(
                "order already {}",
                order.status.as_str()
            )));
        }
        let tx = conn.unchecked_transaction()?;
        // The SQL guard re-checks under the transaction; the precheck
        // above only gives the common case a clean early exit.
        if !reject_order_row(&tx, order_id, &actor.user_id, now)? {
            return Err(DomainError::Conflict(format!(
                "order already {}",
                order.status.as_str()
            )));
        }
        append_timeline(&tx, order_id, &OrderStatus::Rejected, None, now)?;
        tx.commit()?;
        return settle_review(conn, notifier, order_id, "rejected");
    }

    let supplier = match req.supplier_id {
        Some(id) => {
            let supplier = get_user_with_role(conn, &id, Role::Supplier)?
                .ok_or_else(|| DomainError::not_found("supplier", id))?;
            if !supplier.active {
                return Err(DomainError::Validation(format!(
                    "supplier {} is not active",
                    supplier.id
                )));
            }
            Some(supplier)
        }
        None => None,
    };

    let tx = conn.unchecked_transaction()?;
    let approved = approve_order_row(&tx, order_id, &actor.user_id, now)?;
    if approved {
        append_timeline(&tx, order_id, &OrderStatus::DoctorApproved, None, now)?;
    } else if order.status != OrderStatus::DoctorApproved || supplier.is_none() {
        // Not freshly approved and not a forward-later on an approved
        // order: nothing legal to do.
        return Err(DomainError::Conflict(format!(
            "order already {}",
            order.status.as_str()
        )));
    }
    if let Some(supplier) = &supplier {
        if !forward_order_row(&tx, order_id, &supplier.id, now)? {
            return Err(DomainError::Conflict(
                "order already forwarded to a supplier".into(),
            ));
        }
        append_timeline(&tx, order_id, &OrderStatus::ForwardedToSupplier, None, now)?;
    }
    tx.commit()?;

    let result = settle_review(conn, notifier, order_id, "reviewed")?;
    if let Some(supplier) = supplier {
        notifier.dispatch(
            supplier.id,
            WsOutgoing::OrderUpdated {
                order: result.clone(),
            },
        );
        notifier.email(
            supplier.email,
            "Prescription forwarded".into(),
            format!("Order {} is ready for fulfilment.", result.id),
        );
    }
    Ok(result)
}

/// Supplier progress update. Only the bound supplier may write; the status
/// text is free-form apart from the reserved review-stage words.
pub fn update_status(
    conn: &Connection,
    notifier: &Notifier,
    actor: Identity,
    order_id: &Uuid,
    req: StatusUpdateRequest,
) -> Result<MedicineOrder, DomainError> {
    let order = get_order(conn, order_id)?
        .ok_or_else(|| DomainError::not_found("order", order_id))?;
    if actor.role != Role::Supplier || order.supplier_id != Some(actor.user_id) {
        return Err(DomainError::Forbidden(
            "only the assigned supplier can update this order".into(),
        ));
    }
    let text = req.status.trim();
    if text.is_empty() {
        return Err(DomainError::Validation("status must not be blank".into()));
    }
    let status = OrderStatus::parse(text);
    if matches!(
        status,
        OrderStatus::Uploaded
            | OrderStatus::DoctorApproved
            | OrderStatus::ForwardedToSupplier
            | OrderStatus::Rejected
    ) {
        return Err(DomainError::Validation(format!(
            "status '{text}' is reserved for the review stage"
        )));
    }

    let now = Utc::now();
    let tx = conn.unchecked_transaction()?;
    if !supplier_update_row(&tx, order_id, &actor.user_id, &status, now)? {
        return Err(DomainError::Conflict("order changed concurrently".into()));
    }
    append_timeline(&tx, order_id, &status, req.note.as_deref(), now)?;
    tx.commit()?;

    let order = hydrate(conn, order_id)?;
    tracing::info!(order = %order.id, status = order.status.as_str(), "order status updated");
    notifier.dispatch(
        order.patient_id,
        WsOutgoing::OrderUpdated {
            order: order.clone(),
        },
    );
    if let Some(neurologist_id) = order.neurologist_id {
        notifier.dispatch(
            neurologist_id,
            WsOutgoing::OrderUpdated {
                order: order.clone(),
            },
        );
    }
    Ok(order)
}

fn hydrate(conn: &Connection, order_id: &Uuid) -> Result<MedicineOrder, DomainError> {
    get_order(conn, order_id)?.ok_or_else(|| DomainError::not_found("order", order_id))
}

fn settle_review(
    conn: &Connection,
    notifier: &Notifier,
    order_id: &Uuid,
    verb: &str,
) -> Result<MedicineOrder, DomainError> {
    let order = hydrate(conn, order_id)?;
    tracing::info!(order = %order.id, status = order.status.as_str(), "order {verb}");
    notifier.dispatch(
        order.patient_id,
        WsOutgoing::OrderUpdated {
            order: order.clone(),
        },
    );
    Ok(order)
}
