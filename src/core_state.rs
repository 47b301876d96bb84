//! Transport-agnostic application state.
//!
//! `CoreState` is the single shared state between the REST handlers and
//! the WebSocket session loop. Wrapped in `Arc` at startup; each request
//! opens its own database connection while the room registry and mail
//! transport are shared.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rusqlite::Connection;

use crate::config;
use crate::db::{self, DatabaseError};
use crate::notify::{Mailer, NoopMailer, Notifier};
use crate::rooms::SharedRooms;

pub struct CoreState {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Per-connection busy timeout.
    busy_timeout: Duration,
    /// Live room membership, shared with every WebSocket session.
    rooms: SharedRooms,
    /// Outbound email transport.
    mailer: Arc<dyn Mailer>,
}

impl CoreState {
    pub fn new(db_path: PathBuf) -> Self {
        Self {
            db_path,
            busy_timeout: config::busy_timeout(),
            rooms: SharedRooms::new(),
            mailer: Arc::new(NoopMailer),
        }
    }

    /// Replace the mail transport (e.g. with `HttpMailer` when a relay
    /// endpoint is configured).
    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = mailer;
        self
    }

    /// Open a fresh connection for the current request. WAL mode plus the
    /// busy timeout lets concurrent requests coexist on one file.
    pub fn open_db(&self) -> Result<Connection, DatabaseError> {
        let conn = db::open_database(&self.db_path)?;
        db::set_busy_timeout(&conn, self.busy_timeout)?;
        Ok(conn)
    }

    pub fn rooms(&self) -> SharedRooms {
        self.rooms.clone()
    }

    /// Dispatcher bound to this state's room registry and mail transport.
    pub fn notifier(&self) -> Notifier {
        Notifier::new(Arc::new(self.rooms.clone()), Arc::clone(&self.mailer))
    }
}
