//! SurrealDB implementation of [`AttendanceStore`].
//!
//! Inserts go straight at the UNIQUE `(session_id, student_id)` index;
//! a conflicted insert re-reads the surviving row so the caller
//! receives the winner's record, never a partial write.

use chrono::{DateTime, Utc};
use rollcall_core::error::RollcallResult;
use rollcall_core::models::attendance::{
    AttendanceRecord, AttendanceStatus, CreateAttendanceRecord, StatusOverride,
};
use rollcall_core::store::AttendanceStore;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct AttendanceRow {
    session_id: String,
    student_id: String,
    status: String,
    minutes_late: u32,
    recorded_at: DateTime<Utc>,
    device_fingerprint: Option<String>,
    network_origin: Option<String>,
    override_by: Option<String>,
    override_at: Option<DateTime<Utc>>,
    override_previous_status: Option<String>,
    override_reason: Option<String>,
    created_at: DateTime<Utc>,
}

fn parse_status(s: &str) -> Result<AttendanceStatus, DbError> {
    match s {
        "Present" => Ok(AttendanceStatus::Present),
        "Late" => Ok(AttendanceStatus::Late),
        "Absent" => Ok(AttendanceStatus::Absent),
        "Excused" => Ok(AttendanceStatus::Excused),
        other => Err(DbError::Migration(format!(
            "unknown attendance status: {other}"
        ))),
    }
}

fn status_to_string(s: AttendanceStatus) -> &'static str {
    match s {
        AttendanceStatus::Present => "Present",
        AttendanceStatus::Late => "Late",
        AttendanceStatus::Absent => "Absent",
        AttendanceStatus::Excused => "Excused",
    }
}

impl AttendanceRow {
    fn into_record(self) -> Result<AttendanceRecord, DbError> {
        let session_id = Uuid::parse_str(&self.session_id)
            .map_err(|e| DbError::Migration(format!("invalid session UUID: {e}")))?;
        let student_id = Uuid::parse_str(&self.student_id)
            .map_err(|e| DbError::Migration(format!("invalid student UUID: {e}")))?;

        let override_note = match (
            self.override_by,
            self.override_at,
            self.override_previous_status,
            self.override_reason,
        ) {
            (Some(by), Some(at), Some(prev), Some(reason)) => {
                let changed_by = Uuid::parse_str(&by)
                    .map_err(|e| DbError::Migration(format!("invalid override UUID: {e}")))?;
                Some(StatusOverride {
                    changed_by,
                    changed_at: at,
                    previous_status: parse_status(&prev)?,
                    reason,
                })
            }
            (None, None, None, None) => None,
            _ => {
                return Err(DbError::Migration(
                    "partial override audit on attendance record".into(),
                ));
            }
        };

        Ok(AttendanceRecord {
            session_id,
            student_id,
            status: parse_status(&self.status)?,
            minutes_late: self.minutes_late,
            recorded_at: self.recorded_at,
            device_fingerprint: self.device_fingerprint,
            network_origin: self.network_origin,
            override_note,
            created_at: self.created_at,
        })
    }
}

/// SurrealDB implementation of the attendance record store.
#[derive(Clone)]
pub struct SurrealAttendanceStore<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAttendanceStore<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch(
        &self,
        session_id: Uuid,
        student_id: Uuid,
    ) -> Result<AttendanceRecord, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT * FROM attendance_record \
                 WHERE session_id = $session_id AND student_id = $student_id",
            )
            .bind(("session_id", session_id.to_string()))
            .bind(("student_id", student_id.to_string()))
            .await?;

        let rows: Vec<AttendanceRow> = result.take(0)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "attendance_record".into(),
            id: format!("session={session_id} student={student_id}"),
        })?;

        row.into_record()
    }
}

impl<C: Connection> AttendanceStore for SurrealAttendanceStore<C> {
    async fn insert_if_absent(
        &self,
        input: CreateAttendanceRecord,
    ) -> RollcallResult<(AttendanceRecord, bool)> {
        let result = self
            .db
            .query(
                "CREATE attendance_record SET \
                 session_id = $session_id, \
                 student_id = $student_id, \
                 status = $status, \
                 minutes_late = $minutes_late, \
                 recorded_at = $recorded_at, \
                 device_fingerprint = $device_fingerprint, \
                 network_origin = $network_origin",
            )
            .bind(("session_id", input.session_id.to_string()))
            .bind(("student_id", input.student_id.to_string()))
            .bind(("status", status_to_string(input.status)))
            .bind(("minutes_late", input.minutes_late))
            .bind(("recorded_at", input.recorded_at))
            .bind(("device_fingerprint", input.device_fingerprint))
            .bind(("network_origin", input.network_origin))
            .await
            .map_err(DbError::from)?;

        match result.check() {
            Ok(mut ok) => {
                let rows: Vec<AttendanceRow> = ok.take(0).map_err(DbError::from)?;
                let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
                    entity: "attendance_record".into(),
                    id: format!("session={} student={}", input.session_id, input.student_id),
                })?;
                Ok((row.into_record()?, true))
            }
            // The UNIQUE index refused the write; hand back the row
            // that won. Anything else still surfaces as a store error
            // because the re-read will find nothing.
            Err(create_err) => match self.fetch(input.session_id, input.student_id).await {
                Ok(existing) => Ok((existing, false)),
                Err(DbError::NotFound { .. }) => Err(DbError::from(create_err).into()),
                Err(other) => Err(other.into()),
            },
        }
    }

    async fn get(&self, session_id: Uuid, student_id: Uuid) -> RollcallResult<AttendanceRecord> {
        self.fetch(session_id, student_id).await.map_err(Into::into)
    }

    async fn list_for_session(&self, session_id: Uuid) -> RollcallResult<Vec<AttendanceRecord>> {
        let mut result = self
            .db
            .query("SELECT * FROM attendance_record WHERE session_id = $session_id")
            .bind(("session_id", session_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AttendanceRow> = result.take(0).map_err(DbError::from)?;
        rows.into_iter()
            .map(|row| row.into_record().map_err(Into::into))
            .collect()
    }

    async fn apply_override(
        &self,
        session_id: Uuid,
        student_id: Uuid,
        new_status: AttendanceStatus,
        changed_by: Uuid,
        reason: String,
    ) -> RollcallResult<AttendanceRecord> {
        // Read first for the previous status; the `override_by IS NONE`
        // guard below keeps the write atomic, so a racing second
        // override loses cleanly.
        let current = self.fetch(session_id, student_id).await?;
        if current.override_note.is_some() {
            return Err(DbError::PreconditionFailed {
                entity: "attendance_record".into(),
                detail: "record was already overridden".into(),
            }
            .into());
        }

        let mut result = self
            .db
            .query(
                "UPDATE attendance_record SET \
                 status = $new_status, \
                 override_by = $changed_by, \
                 override_at = time::now(), \
                 override_previous_status = $previous_status, \
                 override_reason = $reason \
                 WHERE session_id = $session_id \
                 AND student_id = $student_id \
                 AND override_by IS NONE \
                 RETURN AFTER",
            )
            .bind(("new_status", status_to_string(new_status)))
            .bind(("changed_by", changed_by.to_string()))
            .bind(("previous_status", status_to_string(current.status)))
            .bind(("reason", reason))
            .bind(("session_id", session_id.to_string()))
            .bind(("student_id", student_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AttendanceRow> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => row.into_record().map_err(Into::into),
            None => Err(DbError::PreconditionFailed {
                entity: "attendance_record".into(),
                detail: "record was already overridden".into(),
            }
            .into()),
        }
    }
}
