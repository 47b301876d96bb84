//! Appointment lifecycle: booking and the pending → confirmed/rejected
//! settlement.
//!
//! Both the REST handlers and the WebSocket session loop call into these
//! functions; there is no second code path for either transport.

use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::repository::{
    get_appointment, get_user, get_user_with_role, insert_appointment, settle_appointment,
};
use crate::error::DomainError;
use crate::models::{Appointment, AppointmentStatus, Identity, Role};
use crate::notify::Notifier;
use crate::rooms::WsOutgoing;

/// Booking request as submitted by a patient.
#[derive(Debug, Clone, Deserialize)]
pub struct BookRequest {
    pub neurologist_id: Uuid,
    pub date: NaiveDate,
    pub time: String,
    pub appointment_type: String,
}

/// Book an appointment with a neurologist. Patient-only.
///
/// The new appointment is always `pending`; the neurologist's room gets an
/// `appointment:request` event and the neurologist a best-effort email.
pub fn book(
    conn: &Connection,
    notifier: &Notifier,
    actor: Identity,
    req: BookRequest,
) -> Result<Appointment, DomainError> {
    if actor.role != Role::Patient {
        return Err(DomainError::Forbidden(
            "only patients can book appointments".into(),
        ));
    }
    if req.time.trim().is_empty() || req.appointment_type.trim().is_empty() {
        return Err(DomainError::Validation(
            "time and appointment type are required".into(),
        ));
    }
    if req.neurologist_id == actor.user_id {
        return Err(DomainError::Validation(
            "cannot book an appointment with yourself".into(),
        ));
    }

    let neurologist = get_user_with_role(conn, &req.neurologist_id, Role::Neurologist)?
        .ok_or_else(|| DomainError::not_found("neurologist", req.neurologist_id))?;

    let appointment = Appointment {
        id: Uuid::new_v4(),
        patient_id: actor.user_id,
        neurologist_id: neurologist.id,
        date: req.date,
        time: req.time,
        appointment_type: req.appointment_type,
        status: AppointmentStatus::Pending,
        created_at: Utc::now(),
    };
    insert_appointment(conn, &appointment)?;

    tracing::info!(appointment = %appointment.id, neurologist = %neurologist.id, "appointment booked");
    notifier.dispatch(
        neurologist.id,
        WsOutgoing::AppointmentRequest {
            appointment: appointment.clone(),
        },
    );
    notifier.email(
        neurologist.email,
        "New appointment request".into(),
        format!(
            "A patient has requested a {} on {} at {}.",
            appointment.appointment_type, appointment.date, appointment.time
        ),
    );

    Ok(appointment)
}

/// Settle a pending appointment. Only the assigned neurologist may respond.
///
/// A repeat of an already-applied decision is accepted and re-dispatched;
/// the opposite decision after settlement is a conflict. Of two racing
/// responses, the conditional update in the store lets exactly one win.
pub fn respond(
    conn: &Connection,
    notifier: &Notifier,
    actor: Identity,
    appointment_id: &Uuid,
    accept: bool,
) -> Result<Appointment, DomainError> {
    let appointment = get_appointment(conn, appointment_id)?
        .ok_or_else(|| DomainError::not_found("appointment", appointment_id))?;

    if actor.role != Role::Neurologist || actor.user_id != appointment.neurologist_id {
        return Err(DomainError::Forbidden(
            "only the assigned neurologist can respond".into(),
        ));
    }

    let target = if accept {
        AppointmentStatus::Confirmed
    } else {
        AppointmentStatus::Rejected
    };

    if !settle_appointment(conn, appointment_id, target)? {
        // Row was no longer pending. Same decision is idempotent; the
        // opposite one arrived too late.
        let current = get_appointment(conn, appointment_id)?
            .ok_or_else(|| DomainError::not_found("appointment", appointment_id))?;
        if current.status != target {
            return Err(DomainError::Conflict(format!(
                "appointment already {}",
                current.status.as_str()
            )));
        }
    }

    let settled = Appointment {
        status: target,
        ..appointment
    };

    tracing::info!(appointment = %settled.id, status = settled.status.as_str(), "appointment settled");
    notifier.dispatch(
        settled.patient_id,
        WsOutgoing::AppointmentUpdated {
            appointment: settled.clone(),
        },
    );
    if let Some(patient) = get_user(conn, &settled.patient_id)? {
        notifier.email(
            patient.email,
            format!("Appointment {}", settled.status.as_str()),
            format!(
                "Your {} on {} at {} was {}.",
                settled.appointment_type,
                settled.date,
                settled.time,
                settled.status.as_str()
            ),
        );
    }

    Ok(settled)
}
