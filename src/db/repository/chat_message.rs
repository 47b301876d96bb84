use rusqlite::{params, Connection};
use serde::Serialize;
use uuid::Uuid;

use super::user::parse_utc;
use crate::db::DatabaseError;
use crate::models::ChatMessage;

/// A message joined with its sender's display name, as returned to clients.
#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub content: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

pub fn insert_chat_message(conn: &Connection, msg: &ChatMessage) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO chat_messages (id, appointment_id, sender_id, content, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            msg.id.to_string(),
            msg.appointment_id.to_string(),
            msg.sender_id.to_string(),
            msg.content,
            msg.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Messages for an appointment, ascending by creation time with insertion
/// order (`seq`) breaking same-timestamp ties.
pub fn list_chat_messages(
    conn: &Connection,
    appointment_id: &Uuid,
) -> Result<Vec<MessageView>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT m.id, m.sender_id, u.name, m.content, m.created_at
         FROM chat_messages m JOIN users u ON u.id = m.sender_id
         WHERE m.appointment_id = ?1
         ORDER BY m.created_at ASC, m.seq ASC",
    )?;
    let rows = stmt.query_map(params![appointment_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
        ))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (id, sender_id, sender_name, content, created_at) = row?;
        out.push(MessageView {
            id: Uuid::parse_str(&id).unwrap_or_default(),
            sender_id: Uuid::parse_str(&sender_id).unwrap_or_default(),
            sender_name,
            content,
            created_at: parse_utc(&created_at),
        });
    }
    Ok(out)
}
