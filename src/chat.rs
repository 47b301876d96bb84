//! Appointment-scoped chat between the patient and their neurologist.
//!
//! Messages are persisted before delivery; the live `chat:message` event is
//! a best-effort echo to the other participant's room.

use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::repository::{
    get_appointment, insert_chat_message, list_chat_messages, MessageView,
};
use crate::error::DomainError;
use crate::models::{Appointment, ChatMessage, Identity};
use crate::notify::Notifier;
use crate::rooms::WsOutgoing;

fn load_for_participant(
    conn: &Connection,
    actor: Identity,
    appointment_id: &Uuid,
) -> Result<Appointment, DomainError> {
    let appointment = get_appointment(conn, appointment_id)?
        .ok_or_else(|| DomainError::not_found("appointment", appointment_id))?;
    if actor.user_id != appointment.patient_id && actor.user_id != appointment.neurologist_id {
        return Err(DomainError::Forbidden(
            "not a participant of this appointment".into(),
        ));
    }
    Ok(appointment)
}

/// Persist a message and echo it to the other participant.
pub fn post_message(
    conn: &Connection,
    notifier: &Notifier,
    actor: Identity,
    appointment_id: &Uuid,
    content: &str,
) -> Result<ChatMessage, DomainError> {
    let appointment = load_for_participant(conn, actor, appointment_id)?;
    let content = content.trim();
    if content.is_empty() {
        return Err(DomainError::Validation("message must not be blank".into()));
    }

    let message = ChatMessage {
        id: Uuid::new_v4(),
        appointment_id: *appointment_id,
        sender_id: actor.user_id,
        content: content.to_string(),
        created_at: Utc::now(),
    };
    insert_chat_message(conn, &message)?;

    let recipient = if actor.user_id == appointment.patient_id {
        appointment.neurologist_id
    } else {
        appointment.patient_id
    };
    notifier.dispatch(
        recipient,
        WsOutgoing::ChatMessage {
            appointment_id: *appointment_id,
            message: message.clone(),
        },
    );
    Ok(message)
}

/// Message history, oldest first. Participants only.
pub fn list_messages(
    conn: &Connection,
    actor: Identity,
    appointment_id: &Uuid,
) -> Result<Vec<MessageView>, DomainError> {
    load_for_participant(conn, actor, appointment_id)?;
    Ok(list_chat_messages(conn, appointment_id)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{insert_appointment, insert_user};
    use crate::db::sqlite::open_memory_database;
    use crate::models::{AppointmentStatus, Role, User};
    use crate::notify::test_support::{RecordingMailer, RecordingRouter};
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn seed_user(conn: &Connection, role: Role) -> Identity {
        let id = Uuid::new_v4();
        insert_user(
            conn,
            &User {
                id,
                name: format!("User {id}"),
                email: format!("{id}@example.org"),
                role,
                active: true,
                created_at: Utc::now(),
            },
        )
        .unwrap();
        Identity { user_id: id, role }
    }

    fn fixture() -> (Connection, Notifier, Arc<RecordingRouter>, Appointment, Identity, Identity)
    {
        let conn = open_memory_database().unwrap();
        let router = Arc::new(RecordingRouter::default());
        let notifier = Notifier::new(router.clone(), Arc::new(RecordingMailer::default()));
        let patient = seed_user(&conn, Role::Patient);
        let neuro = seed_user(&conn, Role::Neurologist);
        let appt = Appointment {
            id: Uuid::new_v4(),
            patient_id: patient.user_id,
            neurologist_id: neuro.user_id,
            date: NaiveDate::from_ymd_opt(2025, 10, 7).unwrap(),
            time: "10:00 AM".into(),
            appointment_type: "Consultation".into(),
            status: AppointmentStatus::Confirmed,
            created_at: Utc::now(),
        };
        insert_appointment(&conn, &appt).unwrap();
        (conn, notifier, router, appt, patient, neuro)
    }

    #[test]
    fn message_persists_and_echoes_to_other_participant() {
        let (conn, notifier, router, appt, patient, neuro) = fixture();

        let msg = post_message(&conn, &notifier, patient, &appt.id, "Hello doctor").unwrap();
        assert_eq!(msg.sender_id, patient.user_id);

        let events = router.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, neuro.user_id);
        drop(events);

        let history = list_messages(&conn, neuro, &appt.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "Hello doctor");
    }

    #[test]
    fn neurologist_replies_route_to_patient() {
        let (conn, notifier, router, appt, patient, neuro) = fixture();

        post_message(&conn, &notifier, neuro, &appt.id, "See you Tuesday").unwrap();
        let events = router.events.lock().unwrap();
        assert_eq!(events[0].0, patient.user_id);
    }

    #[test]
    fn outsiders_are_rejected_both_ways() {
        let (conn, notifier, _, appt, _, _) = fixture();
        let outsider = seed_user(&conn, Role::Patient);

        let err = post_message(&conn, &notifier, outsider, &appt.id, "hi").unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));

        let err = list_messages(&conn, outsider, &appt.id).unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[test]
    fn blank_messages_are_rejected() {
        let (conn, notifier, _, appt, patient, _) = fixture();

        let err = post_message(&conn, &notifier, patient, &appt.id, "   ").unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn unknown_appointment_is_not_found() {
        let (conn, notifier, _, _, patient, _) = fixture();

        let err = post_message(&conn, &notifier, patient, &Uuid::new_v4(), "hi").unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }
}
