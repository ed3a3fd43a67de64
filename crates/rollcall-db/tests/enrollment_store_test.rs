//! Integration tests for the enrollment store using in-memory
//! SurrealDB.

use rollcall_core::models::enrollment::EnrollmentStatus;
use rollcall_core::store::EnrollmentLookup;
use rollcall_db::repository::SurrealEnrollmentStore;
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;
use uuid::Uuid;

async fn setup() -> SurrealEnrollmentStore<surrealdb::engine::local::Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    rollcall_db::run_migrations(&db).await.unwrap();
    SurrealEnrollmentStore::new(db)
}

#[tokio::test]
async fn enroll_and_lookup() {
    let store = setup().await;
    let class_id = Uuid::new_v4();
    let student_id = Uuid::new_v4();

    let enrollment = store.enroll(class_id, student_id).await.unwrap();
    assert_eq!(enrollment.class_id, class_id);
    assert_eq!(enrollment.student_id, student_id);
    assert_eq!(enrollment.status, EnrollmentStatus::Active);

    assert!(store.is_actively_enrolled(student_id, class_id).await.unwrap());
    // A stranger is not enrolled.
    assert!(
        !store
            .is_actively_enrolled(Uuid::new_v4(), class_id)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn duplicate_enrollment_is_rejected() {
    let store = setup().await;
    let class_id = Uuid::new_v4();
    let student_id = Uuid::new_v4();

    store.enroll(class_id, student_id).await.unwrap();
    assert!(store.enroll(class_id, student_id).await.is_err());
}

#[tokio::test]
async fn dropped_student_is_not_active() {
    let store = setup().await;
    let class_id = Uuid::new_v4();
    let student_id = Uuid::new_v4();

    store.enroll(class_id, student_id).await.unwrap();
    store.drop_enrollment(class_id, student_id).await.unwrap();

    assert!(
        !store
            .is_actively_enrolled(student_id, class_id)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn list_active_students_excludes_dropped_and_other_classes() {
    let store = setup().await;
    let class_id = Uuid::new_v4();
    let other_class = Uuid::new_v4();

    let active_a = Uuid::new_v4();
    let active_b = Uuid::new_v4();
    let dropped = Uuid::new_v4();
    let elsewhere = Uuid::new_v4();

    store.enroll(class_id, active_a).await.unwrap();
    store.enroll(class_id, active_b).await.unwrap();
    store.enroll(class_id, dropped).await.unwrap();
    store.drop_enrollment(class_id, dropped).await.unwrap();
    store.enroll(other_class, elsewhere).await.unwrap();

    let mut students = store.list_active_students(class_id).await.unwrap();
    students.sort();
    let mut expected = vec![active_a, active_b];
    expected.sort();
    assert_eq!(students, expected);

    assert!(
        store
            .list_active_students(Uuid::new_v4())
            .await
            .unwrap()
            .is_empty()
    );
}
