use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::user::parse_utc;
use crate::db::DatabaseError;
use crate::models::{MedicineOrder, OrderStatus, Role, TimelineEntry};

struct OrderRow {
    id: String,
    patient_id: String,
    neurologist_id: Option<String>,
    supplier_id: Option<String>,
    file_ref: String,
    delivery_address: String,
    status: String,
    created_at: String,
    updated_at: String,
}

impl OrderRow {
    fn into_order(self, timeline: Vec<TimelineEntry>) -> MedicineOrder {
        MedicineOrder {
            id: Uuid::parse_str(&self.id).unwrap_or_default(),
            patient_id: Uuid::parse_str(&self.patient_id).unwrap_or_default(),
            neurologist_id: self.neurologist_id.and_then(|s| Uuid::parse_str(&s).ok()),
            supplier_id: self.supplier_id.and_then(|s| Uuid::parse_str(&s).ok()),
            file_ref: self.file_ref,
            delivery_address: self.delivery_address,
            status: OrderStatus::parse(&self.status),
            timeline,
            created_at: parse_utc(&self.created_at),
            updated_at: parse_utc(&self.updated_at),
        }
    }
}

const SELECT_COLUMNS: &str = "id, patient_id, neurologist_id, supplier_id, file_ref, \
                              delivery_address, status, created_at, updated_at";

fn row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<OrderRow> {
    Ok(OrderRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        neurologist_id: row.get(2)?,
        supplier_id: row.get(3)?,
        file_ref: row.get(4)?,
        delivery_address: row.get(5)?,
        status: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

pub fn insert_order(conn: &Connection, order: &MedicineOrder) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO medicine_orders (id, patient_id, neurologist_id, supplier_id, file_ref, \
         delivery_address, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            order.id.to_string(),
            order.patient_id.to_string(),
            order.neurologist_id.map(|u| u.to_string()),
            order.supplier_id.map(|u| u.to_string()),
            order.file_ref,
            order.delivery_address,
            order.status.as_str(),
            order.created_at.to_rfc3339(),
            order.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn get_order(conn: &Connection, id: &Uuid) -> Result<Option<MedicineOrder>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM medicine_orders WHERE id = ?1"
    ))?;
    let result = stmt.query_row(params![id.to_string()], row_mapper);
    match result {
        Ok(raw) => {
            let timeline = get_timeline(conn, id)?;
            Ok(Some(raw.into_order(timeline)))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Append one audit entry. Rows in `order_timeline` are never updated or
/// deleted; `seq` preserves insertion order.
pub fn append_timeline(
    conn: &Connection,
    order_id: &Uuid,
    status: &OrderStatus,
    note: Option<&str>,
    at: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO order_timeline (order_id, status, note, at) VALUES (?1, ?2, ?3, ?4)",
        params![order_id.to_string(), status.as_str(), note, at.to_rfc3339()],
    )?;
    Ok(())
}

pub fn get_timeline(conn: &Connection, order_id: &Uuid) -> Result<Vec<TimelineEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT status, note, at FROM order_timeline WHERE order_id = ?1 ORDER BY seq ASC",
    )?;
    let rows = stmt.query_map(params![order_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, Option<String>>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (status, note, at) = row?;
        out.push(TimelineEntry {
            status: OrderStatus::parse(&status),
            note,
            at: parse_utc(&at),
        });
    }
    Ok(out)
}

/// Neurologist approval: `uploaded → doctor_approved`, binding the reviewing
/// neurologist. Conditional on the current status; returns `true` if this
/// call performed the transition.
pub fn approve_order_row(
    conn: &Connection,
    id: &Uuid,
    neurologist_id: &Uuid,
    now: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE medicine_orders
         SET status = 'doctor_approved', neurologist_id = ?1, updated_at = ?2
         WHERE id = ?3 AND status = 'uploaded'",
        params![neurologist_id.to_string(), now.to_rfc3339(), id.to_string()],
    )?;
    Ok(changed == 1)
}

/// Neurologist rejection, terminal from `uploaded` or `doctor_approved`.
pub fn reject_order_row(
    conn: &Connection,
    id: &Uuid,
    neurologist_id: &Uuid,
    now: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE medicine_orders
         SET status = 'rejected', neurologist_id = COALESCE(neurologist_id, ?1), updated_at = ?2
         WHERE id = ?3 AND status IN ('uploaded', 'doctor_approved')",
        params![neurologist_id.to_string(), now.to_rfc3339(), id.to_string()],
    )?;
    Ok(changed == 1)
}

/// Bind a supplier: `doctor_approved → forwarded_to_supplier`. The
/// `supplier_id IS NULL` guard makes the binding immutable once set.
pub fn forward_order_row(
    conn: &Connection,
    id: &Uuid,
    supplier_id: &Uuid,
    now: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE medicine_orders
         SET status = 'forwarded_to_supplier', supplier_id = ?1, updated_at = ?2
         WHERE id = ?3 AND status = 'doctor_approved' AND supplier_id IS NULL",
        params![supplier_id.to_string(), now.to_rfc3339(), id.to_string()],
    )?;
    Ok(changed == 1)
}

/// Supplier-stage status write, guarded by the supplier binding.
pub fn supplier_update_row(
    conn: &Connection,
    id: &Uuid,
    supplier_id: &Uuid,
    status: &OrderStatus,
    now: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE medicine_orders SET status = ?1, updated_at = ?2
         WHERE id = ?3 AND supplier_id = ?4",
        params![
            status.as_str(),
            now.to_rfc3339(),
            id.to_string(),
            supplier_id.to_string()
        ],
    )?;
    Ok(changed == 1)
}

/// List orders visible to a user: patients their own, neurologists the ones
/// they reviewed, suppliers the ones bound to them, admins everything.
pub fn list_orders_for(
    conn: &Connection,
    user_id: &Uuid,
    role: Role,
) -> Result<Vec<MedicineOrder>, DatabaseError> {
    let filter = match role {
        Role::Patient => "WHERE patient_id = ?1",
        Role::Neurologist => "WHERE neurologist_id = ?1 OR status = 'uploaded'",
        Role::Supplier => "WHERE supplier_id = ?1",
        Role::Admin => "WHERE ?1 <> ''",
    };
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM medicine_orders {filter} ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map(params![user_id.to_string()], row_mapper)?;

    let mut raw_rows = Vec::new();
    for row in rows {
        raw_rows.push(row?);
    }

    let mut out = Vec::new();
    for raw in raw_rows {
        let order_id = Uuid::parse_str(&raw.id).unwrap_or_default();
        let timeline = get_timeline(conn, &order_id)?;
        out.push(raw.into_order(timeline));
    }
    Ok(out)
}
