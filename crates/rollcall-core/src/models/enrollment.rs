//! Enrollment domain model.
//!
//! Enrollment bookkeeping is a catalog concern; the core only reads
//! membership through [`crate::store::EnrollmentLookup`]. The model
//! lives here because the storage crate persists it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EnrollmentStatus {
    Active,
    Dropped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub class_id: Uuid,
    pub student_id: Uuid,
    pub status: EnrollmentStatus,
    pub enrolled_at: DateTime<Utc>,
}
