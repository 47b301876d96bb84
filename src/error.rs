//! Domain error taxonomy shared by every transition function.
//!
//! Transport layers map these onto their own status codes; the variants
//! themselves are transport-neutral.

use crate::db::DatabaseError;

#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    /// Input is malformed or missing (empty fields, self-referential
    /// booking, inactive supplier).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The actor's role or identity does not permit this operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The entity is not in a state that admits this transition.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<rusqlite::Error> for DomainError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(DatabaseError::from(e))
    }
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}
