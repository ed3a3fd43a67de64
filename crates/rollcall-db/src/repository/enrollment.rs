//! SurrealDB implementation of [`EnrollmentLookup`], plus the
//! catalog-side writes (enroll/drop) used for seeding and tests.

use rollcall_core::error::RollcallResult;
use rollcall_core::models::enrollment::{Enrollment, EnrollmentStatus};
use rollcall_core::store::EnrollmentLookup;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct EnrollmentRow {
    class_id: String,
    student_id: String,
    status: String,
    enrolled_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, SurrealValue)]
struct StudentIdRow {
    student_id: String,
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn parse_status(s: &str) -> Result<EnrollmentStatus, DbError> {
    match s {
        "Active" => Ok(EnrollmentStatus::Active),
        "Dropped" => Ok(EnrollmentStatus::Dropped),
        other => Err(DbError::Migration(format!(
            "unknown enrollment status: {other}"
        ))),
    }
}

impl EnrollmentRow {
    fn into_enrollment(self) -> Result<Enrollment, DbError> {
        let class_id = Uuid::parse_str(&self.class_id)
            .map_err(|e| DbError::Migration(format!("invalid class UUID: {e}")))?;
        let student_id = Uuid::parse_str(&self.student_id)
            .map_err(|e| DbError::Migration(format!("invalid student UUID: {e}")))?;
        Ok(Enrollment {
            class_id,
            student_id,
            status: parse_status(&self.status)?,
            enrolled_at: self.enrolled_at,
        })
    }
}

/// SurrealDB implementation of the enrollment lookup.
#[derive(Clone)]
pub struct SurrealEnrollmentStore<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealEnrollmentStore<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// Enroll a student in a class. Duplicate enrollment is rejected
    /// by the UNIQUE `(class_id, student_id)` index.
    pub async fn enroll(&self, class_id: Uuid, student_id: Uuid) -> RollcallResult<Enrollment> {
        let result = self
            .db
            .query(
                "CREATE enrollment SET \
                 class_id = $class_id, \
                 student_id = $student_id, \
                 status = 'Active'",
            )
            .bind(("class_id", class_id.to_string()))
            .bind(("student_id", student_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        let rows: Vec<EnrollmentRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "enrollment".into(),
            id: format!("class={class_id} student={student_id}"),
        })?;

        row.into_enrollment().map_err(Into::into)
    }

    /// Mark a student's enrollment as dropped.
    pub async fn drop_enrollment(&self, class_id: Uuid, student_id: Uuid) -> RollcallResult<()> {
        self.db
            .query(
                "UPDATE enrollment SET status = 'Dropped' \
                 WHERE class_id = $class_id AND student_id = $student_id",
            )
            .bind(("class_id", class_id.to_string()))
            .bind(("student_id", student_id.to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }
}

impl<C: Connection> EnrollmentLookup for SurrealEnrollmentStore<C> {
    async fn is_actively_enrolled(&self, student_id: Uuid, class_id: Uuid) -> RollcallResult<bool> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM enrollment \
                 WHERE class_id = $class_id \
                 AND student_id = $student_id \
                 AND status = 'Active' \
                 GROUP ALL",
            )
            .bind(("class_id", class_id.to_string()))
            .bind(("student_id", student_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0) > 0)
    }

    async fn list_active_students(&self, class_id: Uuid) -> RollcallResult<Vec<Uuid>> {
        let mut result = self
            .db
            .query(
                "SELECT student_id FROM enrollment \
                 WHERE class_id = $class_id AND status = 'Active'",
            )
            .bind(("class_id", class_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<StudentIdRow> = result.take(0).map_err(DbError::from)?;
        rows.into_iter()
            .map(|row| {
                Uuid::parse_str(&row.student_id)
                    .map_err(|e| DbError::Migration(format!("invalid student UUID: {e}")).into())
            })
            .collect()
    }
}
