//! Database-specific error types and conversions.

use rollcall_core::error::RollcallError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Precondition failed on {entity}: {detail}")]
    PreconditionFailed { entity: String, detail: String },
}

impl From<DbError> for RollcallError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => RollcallError::NotFound { entity, id },
            DbError::PreconditionFailed { entity, detail } => {
                RollcallError::PreconditionFailed { entity, detail }
            }
            DbError::Surreal(e) => RollcallError::StoreUnavailable(e.to_string()),
            DbError::Migration(msg) => RollcallError::Internal(msg),
        }
    }
}
