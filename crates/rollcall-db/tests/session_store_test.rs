//! Integration tests for the session store using in-memory SurrealDB.

use chrono::{Duration, TimeZone, Utc};
use rollcall_core::error::RollcallError;
use rollcall_core::models::session::{CreateClassSession, SessionChange, SessionStatus};
use rollcall_core::store::SessionStore;
use rollcall_db::repository::SurrealSessionStore;
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;
use uuid::Uuid;

/// Helper: spin up in-memory DB and run migrations.
async fn setup() -> SurrealSessionStore<surrealdb::engine::local::Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    rollcall_db::run_migrations(&db).await.unwrap();
    SurrealSessionStore::new(db)
}

fn schedule() -> CreateClassSession {
    let start = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
    CreateClassSession {
        class_id: Uuid::new_v4(),
        scheduled_start_at: start,
        scheduled_end_at: start + Duration::minutes(50),
    }
}

#[tokio::test]
async fn create_starts_scheduled_with_empty_token_slot() {
    let store = setup().await;
    let session = store.create(schedule()).await.unwrap();

    assert_eq!(session.status, SessionStatus::Scheduled);
    assert!(!session.is_active);
    assert_eq!(session.current_token, None);
    assert_eq!(session.token_expires_at, None);
    assert_eq!(session.attendance_count, 0);
    assert_eq!(session.total_enrolled, 0);

    let fetched = store.get(session.id).await.unwrap();
    assert_eq!(fetched.id, session.id);
    assert_eq!(fetched.class_id, session.class_id);
    assert_eq!(fetched.scheduled_start_at, session.scheduled_start_at);
}

#[tokio::test]
async fn get_unknown_session_is_not_found() {
    let store = setup().await;
    let err = store.get(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, RollcallError::NotFound { .. }), "got {err:?}");
}

#[tokio::test]
async fn cas_applies_change_when_status_matches() {
    let store = setup().await;
    let session = store.create(schedule()).await.unwrap();
    let expires = Utc::now() + Duration::seconds(30);

    let updated = store
        .compare_and_set_status(
            session.id,
            &[SessionStatus::Scheduled],
            SessionChange::to(SessionStatus::Active)
                .with_token("tok-1".into(), expires)
                .with_total_enrolled(24),
        )
        .await
        .unwrap();

    assert_eq!(updated.status, SessionStatus::Active);
    assert!(updated.is_active);
    assert_eq!(updated.current_token.as_deref(), Some("tok-1"));
    assert!(updated.token_expires_at.is_some());
    assert_eq!(updated.total_enrolled, 24);
}

#[tokio::test]
async fn cas_fails_and_writes_nothing_on_status_mismatch() {
    let store = setup().await;
    let session = store.create(schedule()).await.unwrap();

    // pause on a Scheduled session
    let err = store
        .compare_and_set_status(
            session.id,
            &[SessionStatus::Active],
            SessionChange::to(SessionStatus::Paused),
        )
        .await
        .unwrap_err();
    assert!(
        matches!(err, RollcallError::PreconditionFailed { .. }),
        "got {err:?}"
    );

    let unchanged = store.get(session.id).await.unwrap();
    assert_eq!(unchanged.status, SessionStatus::Scheduled);
    assert!(!unchanged.is_active);
}

#[tokio::test]
async fn cas_on_unknown_session_is_not_found() {
    let store = setup().await;
    let err = store
        .compare_and_set_status(
            Uuid::new_v4(),
            &[SessionStatus::Scheduled],
            SessionChange::to(SessionStatus::Active),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RollcallError::NotFound { .. }), "got {err:?}");
}

#[tokio::test]
async fn cas_accepts_any_listed_source_state() {
    let store = setup().await;
    let session = store.create(schedule()).await.unwrap();
    let expires = Utc::now() + Duration::seconds(30);

    store
        .compare_and_set_status(
            session.id,
            &[SessionStatus::Scheduled],
            SessionChange::to(SessionStatus::Active).with_token("tok-1".into(), expires),
        )
        .await
        .unwrap();
    store
        .compare_and_set_status(
            session.id,
            &[SessionStatus::Active],
            SessionChange::to(SessionStatus::Paused),
        )
        .await
        .unwrap();

    // Completing accepts the active/paused superstate; this session is
    // Paused.
    let completed = store
        .compare_and_set_status(
            session.id,
            &[SessionStatus::Active, SessionStatus::Paused],
            SessionChange::to(SessionStatus::Completed),
        )
        .await
        .unwrap();
    assert_eq!(completed.status, SessionStatus::Completed);
    assert_eq!(completed.current_token, None);
    assert_eq!(completed.token_expires_at, None);
}

#[tokio::test]
async fn closing_transition_clears_token_slot() {
    let store = setup().await;
    let session = store.create(schedule()).await.unwrap();
    let expires = Utc::now() + Duration::seconds(30);

    store
        .compare_and_set_status(
            session.id,
            &[SessionStatus::Scheduled],
            SessionChange::to(SessionStatus::Active).with_token("tok-1".into(), expires),
        )
        .await
        .unwrap();

    let paused = store
        .compare_and_set_status(
            session.id,
            &[SessionStatus::Active],
            SessionChange::to(SessionStatus::Paused),
        )
        .await
        .unwrap();

    assert_eq!(paused.status, SessionStatus::Paused);
    assert!(!paused.is_active);
    assert_eq!(paused.current_token, None);
    assert_eq!(paused.token_expires_at, None);
}

#[tokio::test]
async fn set_current_token_requires_active_status() {
    let store = setup().await;
    let session = store.create(schedule()).await.unwrap();
    let expires = Utc::now() + Duration::seconds(30);

    // Scheduled: refused.
    let err = store
        .set_current_token(session.id, "tok-x".into(), expires)
        .await
        .unwrap_err();
    assert!(
        matches!(err, RollcallError::PreconditionFailed { .. }),
        "got {err:?}"
    );
    let unchanged = store.get(session.id).await.unwrap();
    assert_eq!(unchanged.current_token, None);

    // Active: accepted and replaces the slot.
    store
        .compare_and_set_status(
            session.id,
            &[SessionStatus::Scheduled],
            SessionChange::to(SessionStatus::Active).with_token("tok-1".into(), expires),
        )
        .await
        .unwrap();
    let rotated = store
        .set_current_token(session.id, "tok-2".into(), expires)
        .await
        .unwrap();
    assert_eq!(rotated.current_token.as_deref(), Some("tok-2"));
}

#[tokio::test]
async fn set_current_token_on_unknown_session_is_not_found() {
    let store = setup().await;
    let err = store
        .set_current_token(Uuid::new_v4(), "tok".into(), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, RollcallError::NotFound { .. }), "got {err:?}");
}

#[tokio::test]
async fn increment_attendance_count_is_cumulative() {
    let store = setup().await;
    let session = store.create(schedule()).await.unwrap();

    for expected in 1..=3u32 {
        let updated = store.increment_attendance_count(session.id).await.unwrap();
        assert_eq!(updated.attendance_count, expected);
    }
}

#[tokio::test]
async fn concurrent_increments_all_land() {
    let store = setup().await;
    let session = store.create(schedule()).await.unwrap();

    let (a, b, c, d) = tokio::join!(
        store.increment_attendance_count(session.id),
        store.increment_attendance_count(session.id),
        store.increment_attendance_count(session.id),
        store.increment_attendance_count(session.id),
    );
    a.unwrap();
    b.unwrap();
    c.unwrap();
    d.unwrap();

    let current = store.get(session.id).await.unwrap();
    assert_eq!(current.attendance_count, 4);
}
