//! Attendance record domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of one student's attendance for one session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AttendanceStatus {
    Present,
    Late,
    Absent,
    Excused,
}

/// Audit trail of the at-most-one instructor correction applied to a
/// record after it was first written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusOverride {
    pub changed_by: Uuid,
    pub changed_at: DateTime<Utc>,
    pub previous_status: AttendanceStatus,
    pub reason: String,
}

/// One student's outcome for one session.
///
/// Identity is the `(session_id, student_id)` pair: at most one record
/// exists per pair, enforced by a storage-level uniqueness constraint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub session_id: Uuid,
    pub student_id: Uuid,
    pub status: AttendanceStatus,
    pub minutes_late: u32,
    pub recorded_at: DateTime<Utc>,
    /// Anti-abuse signal, persisted but never evaluated by the core.
    pub device_fingerprint: Option<String>,
    /// Anti-abuse signal, persisted but never evaluated by the core.
    pub network_origin: Option<String>,
    pub override_note: Option<StatusOverride>,
    pub created_at: DateTime<Utc>,
}

/// Input for inserting an attendance record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAttendanceRecord {
    pub session_id: Uuid,
    pub student_id: Uuid,
    pub status: AttendanceStatus,
    pub minutes_late: u32,
    pub recorded_at: DateTime<Utc>,
    pub device_fingerprint: Option<String>,
    pub network_origin: Option<String>,
}
