//! Database error classification

use thiserror::Error;

/// Database layer errors.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Row not found: {0}")]
    NotFound(String),

    #[error("Invalid stored data: {0}")]
    Corrupt(String),
}

impl DatabaseError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::NotFound(_))
            || matches!(self, DatabaseError::Sqlx(sqlx::Error::RowNotFound))
    }

    pub fn is_constraint_violation(&self) -> bool {
        match self {
            DatabaseError::Sqlx(sqlx::Error::Database(db)) => db.is_unique_violation()
                || db.is_foreign_key_violation()
                || db.is_check_violation(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for DatabaseError {
    fn from(err: serde_json::Error) -> Self {
        DatabaseError::Corrupt(err.to_string())
    }
}
