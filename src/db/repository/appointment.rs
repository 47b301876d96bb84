use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::user::parse_utc;
use crate::db::DatabaseError;
use crate::models::{Appointment, AppointmentStatus, Role};

struct AppointmentRow {
    id: String,
    patient_id: String,
    neurologist_id: String,
    date: String,
    time: String,
    appointment_type: String,
    status: String,
    created_at: String,
}

impl AppointmentRow {
    fn into_appointment(self) -> Result<Appointment, DatabaseError> {
        Ok(Appointment {
            id: Uuid::parse_str(&self.id).unwrap_or_default(),
            patient_id: Uuid::parse_str(&self.patient_id).unwrap_or_default(),
            neurologist_id: Uuid::parse_str(&self.neurologist_id).unwrap_or_default(),
            date: NaiveDate::parse_from_str(&self.date, "%Y-%m-%d").map_err(|_| {
                DatabaseError::ConstraintViolation(format!("bad date: {}", self.date))
            })?,
            time: self.time,
            appointment_type: self.appointment_type,
            status: AppointmentStatus::from_str(&self.status)?,
            created_at: parse_utc(&self.created_at),
        })
    }
}

const SELECT_COLUMNS: &str =
    "id, patient_id, neurologist_id, date, time, appointment_type, status, created_at";

fn row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<AppointmentRow> {
    Ok(AppointmentRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        neurologist_id: row.get(2)?,
        date: row.get(3)?,
        time: row.get(4)?,
        appointment_type: row.get(5)?,
        status: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub fn insert_appointment(conn: &Connection, appt: &Appointment) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO appointments (id, patient_id, neurologist_id, date, time, appointment_type, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            appt.id.to_string(),
            appt.patient_id.to_string(),
            appt.neurologist_id.to_string(),
            appt.date.to_string(),
            appt.time,
            appt.appointment_type,
            appt.status.as_str(),
            appt.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn get_appointment(conn: &Connection, id: &Uuid) -> Result<Option<Appointment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM appointments WHERE id = ?1"
    ))?;
    let result = stmt.query_row(params![id.to_string()], row_mapper);
    match result {
        Ok(raw) => Ok(Some(raw.into_appointment()?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Atomically settle a pending appointment to `confirmed` or `rejected`.
///
/// The conditional `WHERE status = 'pending'` is the single-row atomic
/// read-modify-write: of two racing settlements, exactly one updates.
/// Returns `true` if this call performed the transition.
pub fn settle_appointment(
    conn: &Connection,
    id: &Uuid,
    status: AppointmentStatus,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE appointments SET status = ?1 WHERE id = ?2 AND status = 'pending'",
        params![status.as_str(), id.to_string()],
    )?;
    Ok(changed == 1)
}

/// List appointments visible to a user: patients see their own bookings,
/// neurologists see appointments assigned to them, admins see everything.
pub fn list_appointments_for(
    conn: &Connection,
    user_id: &Uuid,
    role: Role,
) -> Result<Vec<Appointment>, DatabaseError> {
    let filter = match role {
        Role::Patient => "WHERE patient_id = ?1",
        Role::Neurologist => "WHERE neurologist_id = ?1",
        Role::Admin => "WHERE ?1 <> ''",
        Role::Supplier => return Ok(Vec::new()),
    };
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM appointments {filter} ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map(params![user_id.to_string()], row_mapper)?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?.into_appointment()?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::user::insert_user;
    use crate::db::sqlite::open_memory_database;
    use crate::models::User;
    use chrono::Utc;

    fn seed_user(conn: &Connection, role: Role) -> Uuid {
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
        id
    }

    fn make_appointment(conn: &Connection) -> Appointment {
        let patient = seed_user(conn, Role::Patient);
        let neurologist = seed_user(conn, Role::Neurologist);
        let appt = Appointment {
            id: Uuid::new_v4(),
            patient_id: patient,
            neurologist_id: neurologist,
            date: NaiveDate::from_ymd_opt(2025, 9, 30).unwrap(),
            time: "10:00 AM".into(),
            appointment_type: "Consultation".into(),
            status: AppointmentStatus::Pending,
            created_at: Utc::now(),
        };
        insert_appointment(conn, &appt).unwrap();
        appt
    }

    #[test]
    fn insert_and_get_roundtrip() {
        let conn = open_memory_database().unwrap();
        let appt = make_appointment(&conn);

        let found = get_appointment(&conn, &appt.id).unwrap().unwrap();
        assert_eq!(found, appt);
    }

    #[test]
    fn settle_transitions_pending_once() {
        let conn = open_memory_database().unwrap();
        let appt = make_appointment(&conn);

        assert!(settle_appointment(&conn, &appt.id, AppointmentStatus::Confirmed).unwrap());
        // Second settlement loses the race: row is no longer pending.
        assert!(!settle_appointment(&conn, &appt.id, AppointmentStatus::Rejected).unwrap());

        let found = get_appointment(&conn, &appt.id).unwrap().unwrap();
        assert_eq!(found.status, AppointmentStatus::Confirmed);
    }

    #[test]
    fn listing_scopes_by_role() {
        let conn = open_memory_database().unwrap();
        let appt = make_appointment(&conn);
        let other_patient = seed_user(&conn, Role::Patient);

        let own = list_appointments_for(&conn, &appt.patient_id, Role::Patient).unwrap();
        assert_eq!(own.len(), 1);

        let assigned =
            list_appointments_for(&conn, &appt.neurologist_id, Role::Neurologist).unwrap();
        assert_eq!(assigned.len(), 1);

        let unrelated = list_appointments_for(&conn, &other_patient, Role::Patient).unwrap();
        assert!(unrelated.is_empty());

        let admin = list_appointments_for(&conn, &Uuid::new_v4(), Role::Admin).unwrap();
        assert_eq!(admin.len(), 1);

        let supplier = list_appointments_for(&conn, &Uuid::new_v4(), Role::Supplier).unwrap();
        assert!(supplier.is_empty());
    }
}
