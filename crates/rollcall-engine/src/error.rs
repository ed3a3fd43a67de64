//! Engine error types.

use rollcall_core::error::RollcallError;
use rollcall_core::models::attendance::AttendanceRecord;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("token could not be parsed")]
    MalformedToken,

    /// Expired or bad signature. The codec distinguishes internally;
    /// the distinction is deliberately not exposed to redeeming
    /// clients.
    #[error("token is not valid")]
    InvalidToken,

    #[error("session is not open for attendance")]
    SessionNotOpen,

    #[error("student is not actively enrolled in this class")]
    NotEnrolled,

    /// The losing side of a duplicate redemption. Carries the record
    /// that won, so the conflict is an idempotent read rather than a
    /// dead end.
    #[error("attendance already recorded for this session")]
    AlreadyRecorded { existing: Box<AttendanceRecord> },

    #[error(transparent)]
    Store(#[from] RollcallError),
}

impl From<EngineError> for RollcallError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::MalformedToken => RollcallError::MalformedToken,
            EngineError::InvalidToken => RollcallError::InvalidToken,
            EngineError::SessionNotOpen => RollcallError::SessionNotOpen,
            EngineError::NotEnrolled => RollcallError::NotEnrolled,
            EngineError::AlreadyRecorded { .. } => RollcallError::AlreadyRecorded,
            EngineError::Store(inner) => inner,
        }
    }
}
