use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::AppointmentStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub neurologist_id: Uuid,
    /// Calendar date, no timezone attached.
    pub date: NaiveDate,
    /// Free-text slot as entered by the patient ("10:00 AM").
    pub time: String,
    pub appointment_type: String,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
}
