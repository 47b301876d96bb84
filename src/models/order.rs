use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::OrderStatus;

/// One audit entry in an order's append-only timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub status: OrderStatus,
    pub note: Option<String>,
    pub at: DateTime<Utc>,
}

/// A prescription order. `neurologist_id` is bound at review,
/// `supplier_id` at forwarding; neither is ever reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicineOrder {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub neurologist_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    /// Opaque reference into the external file store (uploaded prescription).
    pub file_ref: String,
    pub delivery_address: String,
    pub status: OrderStatus,
    /// Durable audit trail, ordered; never shorter than the number of
    /// transitions applied.
    pub timeline: Vec<TimelineEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
