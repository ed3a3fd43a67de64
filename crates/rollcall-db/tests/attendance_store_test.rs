//! Integration tests for the attendance record store using in-memory
//! SurrealDB.

use chrono::Utc;
use rollcall_core::error::RollcallError;
use rollcall_core::models::attendance::{AttendanceStatus, CreateAttendanceRecord};
use rollcall_core::store::AttendanceStore;
use rollcall_db::repository::SurrealAttendanceStore;
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;
use uuid::Uuid;

async fn setup() -> SurrealAttendanceStore<surrealdb::engine::local::Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    rollcall_db::run_migrations(&db).await.unwrap();
    SurrealAttendanceStore::new(db)
}

fn present_record(session_id: Uuid, student_id: Uuid) -> CreateAttendanceRecord {
    CreateAttendanceRecord {
        session_id,
        student_id,
        status: AttendanceStatus::Present,
        minutes_late: 0,
        recorded_at: Utc::now(),
        device_fingerprint: Some("device-abc".into()),
        network_origin: Some("203.0.113.5".into()),
    }
}

#[tokio::test]
async fn insert_then_duplicate_returns_existing() {
    let store = setup().await;
    let session_id = Uuid::new_v4();
    let student_id = Uuid::new_v4();

    let (record, inserted) = store
        .insert_if_absent(present_record(session_id, student_id))
        .await
        .unwrap();
    assert!(inserted);
    assert_eq!(record.status, AttendanceStatus::Present);
    assert_eq!(record.device_fingerprint.as_deref(), Some("device-abc"));

    // Second insert with different fields: the original row survives
    // untouched.
    let late_attempt = CreateAttendanceRecord {
        status: AttendanceStatus::Late,
        minutes_late: 12,
        ..present_record(session_id, student_id)
    };
    let (existing, inserted) = store.insert_if_absent(late_attempt).await.unwrap();
    assert!(!inserted);
    assert_eq!(existing.status, AttendanceStatus::Present);
    assert_eq!(existing.minutes_late, 0);
}

#[tokio::test]
async fn concurrent_inserts_yield_exactly_one_row() {
    let store = setup().await;
    let session_id = Uuid::new_v4();
    let student_id = Uuid::new_v4();

    let (a, b, c) = tokio::join!(
        store.insert_if_absent(present_record(session_id, student_id)),
        store.insert_if_absent(present_record(session_id, student_id)),
        store.insert_if_absent(present_record(session_id, student_id)),
    );

    let outcomes = [a.unwrap(), b.unwrap(), c.unwrap()];
    let inserted = outcomes.iter().filter(|(_, fresh)| *fresh).count();
    assert_eq!(inserted, 1, "exactly one concurrent insert must win");

    let rows = store.list_for_session(session_id).await.unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn same_student_different_sessions_are_independent() {
    let store = setup().await;
    let student_id = Uuid::new_v4();
    let session_a = Uuid::new_v4();
    let session_b = Uuid::new_v4();

    let (_, first) = store
        .insert_if_absent(present_record(session_a, student_id))
        .await
        .unwrap();
    let (_, second) = store
        .insert_if_absent(present_record(session_b, student_id))
        .await
        .unwrap();

    assert!(first);
    assert!(second);
}

#[tokio::test]
async fn get_missing_record_is_not_found() {
    let store = setup().await;
    let err = store
        .get(Uuid::new_v4(), Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, RollcallError::NotFound { .. }), "got {err:?}");
}

#[tokio::test]
async fn list_for_session_returns_only_that_session() {
    let store = setup().await;
    let session_id = Uuid::new_v4();
    let other_session = Uuid::new_v4();

    for _ in 0..3 {
        store
            .insert_if_absent(present_record(session_id, Uuid::new_v4()))
            .await
            .unwrap();
    }
    store
        .insert_if_absent(present_record(other_session, Uuid::new_v4()))
        .await
        .unwrap();

    let rows = store.list_for_session(session_id).await.unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r.session_id == session_id));
}

#[tokio::test]
async fn override_is_audited_and_single_use() {
    let store = setup().await;
    let session_id = Uuid::new_v4();
    let student_id = Uuid::new_v4();
    let instructor = Uuid::new_v4();

    store
        .insert_if_absent(CreateAttendanceRecord {
            status: AttendanceStatus::Absent,
            ..present_record(session_id, student_id)
        })
        .await
        .unwrap();

    let overridden = store
        .apply_override(
            session_id,
            student_id,
            AttendanceStatus::Excused,
            instructor,
            "doctor's note".into(),
        )
        .await
        .unwrap();

    assert_eq!(overridden.status, AttendanceStatus::Excused);
    let note = overridden.override_note.expect("audit note must be set");
    assert_eq!(note.changed_by, instructor);
    assert_eq!(note.previous_status, AttendanceStatus::Absent);
    assert_eq!(note.reason, "doctor's note");

    // A second correction is refused.
    let err = store
        .apply_override(
            session_id,
            student_id,
            AttendanceStatus::Present,
            instructor,
            "changed my mind".into(),
        )
        .await
        .unwrap_err();
    assert!(
        matches!(err, RollcallError::PreconditionFailed { .. }),
        "got {err:?}"
    );

    // The record still reflects the first override.
    let current = store.get(session_id, student_id).await.unwrap();
    assert_eq!(current.status, AttendanceStatus::Excused);
}

#[tokio::test]
async fn override_of_missing_record_is_not_found() {
    let store = setup().await;
    let err = store
        .apply_override(
            Uuid::new_v4(),
            Uuid::new_v4(),
            AttendanceStatus::Excused,
            Uuid::new_v4(),
            "note".into(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RollcallError::NotFound { .. }), "got {err:?}");
}
