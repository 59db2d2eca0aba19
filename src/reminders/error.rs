use crate::core_state::CoreError;
use crate::db::DatabaseError;
use crate::email::EmailError;
use crate::models::TransitionError;

#[derive(Debug, thiserror::Error)]
pub enum ReminderError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("{0}")]
    Core(#[from] CoreError),
    #[error("Validation failed: {0}")]
    Validation(String),
    /// Missing, or owned by someone else. The two are indistinguishable to callers.
    #[error("{0} not found")]
    NotFound(&'static str),
    /// Another writer changed the record between read and write.
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("Email failed: {0}")]
    Email(#[from] EmailError),
}

impl From<rusqlite::Error> for ReminderError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(DatabaseError::Sqlite(err))
    }
}
