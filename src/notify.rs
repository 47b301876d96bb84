//! Notification dispatcher: one place where state changes fan out.
//!
//! Each accepted transition produces exactly one dispatch. Real-time
//! delivery goes through the room router; email is a best-effort side
//! channel whose failure never rolls back the state change.

use std::sync::Arc;

use uuid::Uuid;

use crate::rooms::{RoomRouter, WsOutgoing};

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail transport error: {0}")]
    Transport(String),

    #[error("mail endpoint returned status {0}")]
    Status(u16),
}

/// Outbound email transport. Synchronous by design: implementations run
/// on a blocking worker, never on the async runtime.
pub trait Mailer: Send + Sync {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

/// Default transport when no mail endpoint is configured.
#[derive(Debug, Default)]
pub struct NoopMailer;

impl Mailer for NoopMailer {
    fn send(&self, to: &str, subject: &str, _body: &str) -> Result<(), MailError> {
        tracing::debug!(to = %to, subject = %subject, "mail transport disabled, dropping");
        Ok(())
    }
}

/// Posts mail as JSON to an HTTP relay endpoint.
pub struct HttpMailer {
    // Built on first send: the blocking client must not be constructed
    // on the async runtime.
    client: std::sync::OnceLock<reqwest::blocking::Client>,
    endpoint: String,
}

impl HttpMailer {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: std::sync::OnceLock::new(),
            endpoint,
        }
    }
}

impl Mailer for HttpMailer {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let response = self
            .client
            .get_or_init(reqwest::blocking::Client::new)
            .post(&self.endpoint)
            .json(&serde_json::json!({
                "to": to,
                "subject": subject,
                "body": body,
            }))
            .send()
            .map_err(|e| MailError::Transport(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(MailError::Status(response.status().as_u16()))
        }
    }
}

/// Fans a transition out to the affected user's room and, optionally,
/// their mailbox.
#[derive(Clone)]
pub struct Notifier {
    router: Arc<dyn RoomRouter>,
    mailer: Arc<dyn Mailer>,
}

impl Notifier {
    pub fn new(router: Arc<dyn RoomRouter>, mailer: Arc<dyn Mailer>) -> Self {
        Self { router, mailer }
    }

    /// Emit an event into a user's room. Empty room is a silent no-op.
    pub fn dispatch(&self, room: Uuid, event: WsOutgoing) {
        self.router.emit(room, event);
    }

    /// Fire-and-forget email on a blocking worker. Failures are logged,
    /// never surfaced to the caller.
    pub fn email(&self, to: String, subject: String, body: String) {
        let mailer = Arc::clone(&self.mailer);
        tokio::task::spawn_blocking(move || {
            if let Err(e) = mailer.send(&to, &subject, &body) {
                tracing::warn!(to = %to, subject = %subject, error = %e, "email delivery failed");
            }
        });
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// Captures emitted events for assertions.
    #[derive(Default)]
    pub struct RecordingRouter {
        pub events: Mutex<Vec<(Uuid, WsOutgoing)>>,
    }

    impl RoomRouter for RecordingRouter {
        fn emit(&self, room: Uuid, event: WsOutgoing) -> usize {
            self.events.lock().unwrap().push((room, event));
            1
        }
    }

    /// Captures sent mail for assertions.
    #[derive(Default)]
    pub struct RecordingMailer {
        pub sent: Mutex<Vec<(String, String, String)>>,
    }

    impl Mailer for RecordingMailer {
        fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), subject.to_string(), body.to_string()));
            Ok(())
        }
    }

    /// A mailer whose every send fails, for failure-isolation tests.
    pub struct FailingMailer;

    impl Mailer for FailingMailer {
        fn send(&self, _to: &str, _subject: &str, _body: &str) -> Result<(), MailError> {
            Err(MailError::Transport("connection refused".into()))
        }
    }
}
