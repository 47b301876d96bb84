use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::{Role, User};

struct UserRow {
    id: String,
    name: String,
    email: String,
    role: String,
    active: i64,
    created_at: String,
}

impl UserRow {
    fn into_user(self) -> Result<User, DatabaseError> {
        Ok(User {
            id: Uuid::parse_str(&self.id).unwrap_or_default(),
            name: self.name,
            email: self.email,
            role: Role::from_str(&self.role)?,
            active: self.active != 0,
            created_at: parse_utc(&self.created_at),
        })
    }
}

pub(crate) fn parse_utc(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

pub fn insert_user(conn: &Connection, user: &User) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO users (id, name, email, role, active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user.id.to_string(),
            user.name,
            user.email,
            user.role.as_str(),
            user.active as i64,
            user.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: &Uuid) -> Result<Option<User>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, email, role, active, created_at FROM users WHERE id = ?1",
    )?;

    let result = stmt.query_row(params![id.to_string()], |row| {
        Ok(UserRow {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            role: row.get(3)?,
            active: row.get(4)?,
            created_at: row.get(5)?,
        })
    });
    match result {
        Ok(raw) => Ok(Some(raw.into_user()?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Look up a user and confirm the expected role. Returns `None` when the
/// user is absent or holds a different role.
pub fn get_user_with_role(
    conn: &Connection,
    id: &Uuid,
    role: Role,
) -> Result<Option<User>, DatabaseError> {
    Ok(get_user(conn, id)?.filter(|u| u.role == role))
}

pub fn get_display_name(conn: &Connection, id: &Uuid) -> Result<Option<String>, DatabaseError> {
    let result = conn.query_row(
        "SELECT name FROM users WHERE id = ?1",
        params![id.to_string()],
        |row| row.get::<_, String>(0),
    );
    match result {
        Ok(name) => Ok(Some(name)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
