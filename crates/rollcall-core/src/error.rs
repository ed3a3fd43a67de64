//! Error types for the Rollcall system.

use thiserror::Error;

/// The caller-visible error taxonomy.
///
/// Every variant except `StoreUnavailable` and `Internal` is
/// recoverable by the caller: the client should surface a message and
/// move on. Storage failures are eligible for caller-driven retry; the
/// engine itself never retries.
#[derive(Debug, Error)]
pub enum RollcallError {
    #[error("token could not be parsed")]
    MalformedToken,

    /// Expired or bad signature, deliberately undifferentiated so the
    /// redeeming client learns nothing about which check failed.
    #[error("token is not valid")]
    InvalidToken,

    /// The session is not open for redemption. Covers paused,
    /// completed, cancelled, and unknown sessions uniformly.
    #[error("session is not open for attendance")]
    SessionNotOpen,

    #[error("student is not actively enrolled in this class")]
    NotEnrolled,

    #[error("attendance already recorded for this session")]
    AlreadyRecorded,

    /// A lifecycle transition or guarded write was attempted from a
    /// state that does not permit it.
    #[error("precondition failed on {entity}: {detail}")]
    PreconditionFailed { entity: String, detail: String },

    #[error("entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("storage unavailable: {0}")]
    StoreUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type RollcallResult<T> = Result<T, RollcallError>;
