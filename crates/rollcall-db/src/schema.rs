//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode for data integrity.
//! UUIDs are stored as strings. Enums are stored as strings with
//! ASSERT constraints for validation. The UNIQUE index on
//! `attendance_record (session_id, student_id)` is the enforcement
//! point of the one-record-per-student invariant: concurrent
//! redemption attempts cannot race past it.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1 — initial table definitions
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Class sessions
-- =======================================================================
DEFINE TABLE class_session SCHEMAFULL;
DEFINE FIELD class_id ON TABLE class_session TYPE string;
DEFINE FIELD scheduled_start_at ON TABLE class_session TYPE datetime;
DEFINE FIELD scheduled_end_at ON TABLE class_session TYPE datetime;
DEFINE FIELD status ON TABLE class_session TYPE string \
    ASSERT $value IN ['Scheduled', 'Active', 'Paused', 'Completed', \
    'Cancelled'];
DEFINE FIELD is_active ON TABLE class_session TYPE bool DEFAULT false;
DEFINE FIELD current_token ON TABLE class_session TYPE option<string>;
DEFINE FIELD token_expires_at ON TABLE class_session \
    TYPE option<datetime>;
DEFINE FIELD attendance_count ON TABLE class_session TYPE int \
    DEFAULT 0;
DEFINE FIELD total_enrolled ON TABLE class_session TYPE int DEFAULT 0;
DEFINE FIELD created_at ON TABLE class_session TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE class_session TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_session_class ON TABLE class_session COLUMNS class_id;

-- =======================================================================
-- Attendance records (one per session/student pair)
-- =======================================================================
DEFINE TABLE attendance_record SCHEMAFULL;
DEFINE FIELD session_id ON TABLE attendance_record TYPE string;
DEFINE FIELD student_id ON TABLE attendance_record TYPE string;
DEFINE FIELD status ON TABLE attendance_record TYPE string \
    ASSERT $value IN ['Present', 'Late', 'Absent', 'Excused'];
DEFINE FIELD minutes_late ON TABLE attendance_record TYPE int \
    DEFAULT 0;
DEFINE FIELD recorded_at ON TABLE attendance_record TYPE datetime;
DEFINE FIELD device_fingerprint ON TABLE attendance_record \
    TYPE option<string>;
DEFINE FIELD network_origin ON TABLE attendance_record \
    TYPE option<string>;
DEFINE FIELD override_by ON TABLE attendance_record \
    TYPE option<string>;
DEFINE FIELD override_at ON TABLE attendance_record \
    TYPE option<datetime>;
DEFINE FIELD override_previous_status ON TABLE attendance_record \
    TYPE option<string>;
DEFINE FIELD override_reason ON TABLE attendance_record \
    TYPE option<string>;
DEFINE FIELD created_at ON TABLE attendance_record TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_attendance_session_student ON TABLE attendance_record \
    COLUMNS session_id, student_id UNIQUE;
DEFINE INDEX idx_attendance_session ON TABLE attendance_record \
    COLUMNS session_id;

-- =======================================================================
-- Enrollments (class membership)
-- =======================================================================
DEFINE TABLE enrollment SCHEMAFULL;
DEFINE FIELD class_id ON TABLE enrollment TYPE string;
DEFINE FIELD student_id ON TABLE enrollment TYPE string;
DEFINE FIELD status ON TABLE enrollment TYPE string \
    ASSERT $value IN ['Active', 'Dropped'];
DEFINE FIELD enrolled_at ON TABLE enrollment TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_enrollment_class_student ON TABLE enrollment \
    COLUMNS class_id, student_id UNIQUE;
DEFINE INDEX idx_enrollment_class ON TABLE enrollment COLUMNS class_id;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
/// All DEFINE statements are idempotent so re-running is safe.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    // Ensure migration tracking table exists (idempotent).
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    // Determine current schema version.
    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            db.query(migration.sql).await?.check().map_err(|e| {
                DbError::Migration(format!(
                    "Migration v{} '{}' failed: {}",
                    migration.version, migration.name, e,
                ))
            })?;

            // Record the applied migration.
            db.query(
                "CREATE _migration SET version = $version, \
                 name = $name",
            )
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

            info!(
                version = migration.version,
                "Migration applied successfully"
            );
        }
    }

    Ok(())
}

/// Returns the raw schema DDL for version 1.
///
/// Exposed for testing with in-memory SurrealDB instances that
/// bypass the migration runner.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_v1_is_nonempty() {
        assert!(!SCHEMA_V1.is_empty());
    }

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(
                window[0].version < window[1].version,
                "Migrations must be in ascending version order"
            );
        }
    }
}
