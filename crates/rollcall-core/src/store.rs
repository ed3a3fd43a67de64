//! Store and bus trait definitions for data access abstraction.
//!
//! All store operations are async. The session row is the only
//! contended resource in the system: every mutation of it goes through
//! either a conditional update (`compare_and_set_status`,
//! `set_current_token`) or an atomic increment
//! (`increment_attendance_count`). Implementations must never perform
//! the read-modify-write in application memory.

use uuid::Uuid;

use crate::error::RollcallResult;
use crate::event::Event;
use crate::models::attendance::{AttendanceRecord, AttendanceStatus, CreateAttendanceRecord};
use crate::models::session::{ClassSession, CreateClassSession, SessionChange, SessionStatus};

/// Durable record of a session's lifecycle state and denormalized
/// counters.
pub trait SessionStore: Send + Sync {
    fn create(
        &self,
        input: CreateClassSession,
    ) -> impl Future<Output = RollcallResult<ClassSession>> + Send;

    fn get(&self, id: Uuid) -> impl Future<Output = RollcallResult<ClassSession>> + Send;

    /// Atomically apply `change` iff the current status is one of
    /// `expected`; fails with `PreconditionFailed` otherwise. This is
    /// the sole authority for lifecycle transitions: a status read
    /// before an await point must never be trusted at write time.
    fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: &[SessionStatus],
        change: SessionChange,
    ) -> impl Future<Output = RollcallResult<ClassSession>> + Send;

    /// Replace the current token slot, guarded to Active status so a
    /// rotation tick racing a closing transition cannot leave a live
    /// token on a closed session. Fails with `PreconditionFailed` when
    /// the session is no longer Active.
    fn set_current_token(
        &self,
        id: Uuid,
        token: String,
        expires_at: chrono::DateTime<chrono::Utc>,
    ) -> impl Future<Output = RollcallResult<ClassSession>> + Send;

    /// Atomic `attendance_count += 1`; returns the updated session.
    fn increment_attendance_count(
        &self,
        id: Uuid,
    ) -> impl Future<Output = RollcallResult<ClassSession>> + Send;
}

/// Durable attendance records, unique per `(session_id, student_id)`.
pub trait AttendanceStore: Send + Sync {
    /// Insert a record unless one already exists for the
    /// `(session_id, student_id)` pair. Returns `(record, true)` on a
    /// genuine insert, `(existing, false)` on conflict, never an
    /// overwrite. The uniqueness constraint lives in storage, so
    /// concurrent attempts cannot race past an application-level check.
    fn insert_if_absent(
        &self,
        input: CreateAttendanceRecord,
    ) -> impl Future<Output = RollcallResult<(AttendanceRecord, bool)>> + Send;

    fn get(
        &self,
        session_id: Uuid,
        student_id: Uuid,
    ) -> impl Future<Output = RollcallResult<AttendanceRecord>> + Send;

    fn list_for_session(
        &self,
        session_id: Uuid,
    ) -> impl Future<Output = RollcallResult<Vec<AttendanceRecord>>> + Send;

    /// Apply the at-most-one instructor correction to a record. Fails
    /// with `PreconditionFailed` if the record was already overridden,
    /// `NotFound` if no record exists for the pair.
    fn apply_override(
        &self,
        session_id: Uuid,
        student_id: Uuid,
        new_status: AttendanceStatus,
        changed_by: Uuid,
        reason: String,
    ) -> impl Future<Output = RollcallResult<AttendanceRecord>> + Send;
}

/// Membership lookup against the catalog's enrollment bookkeeping.
pub trait EnrollmentLookup: Send + Sync {
    fn is_actively_enrolled(
        &self,
        student_id: Uuid,
        class_id: Uuid,
    ) -> impl Future<Output = RollcallResult<bool>> + Send;

    fn list_active_students(
        &self,
        class_id: Uuid,
    ) -> impl Future<Output = RollcallResult<Vec<Uuid>>> + Send;
}

/// Fan-out of lifecycle and attendance events to subscribers.
///
/// Publishing is infallible from the caller's perspective:
/// implementations log delivery problems and drop the event.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: Event) -> impl Future<Output = ()> + Send;
}
