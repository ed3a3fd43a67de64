//! Lifecycle and attendance events published to subscribers.
//!
//! Delivery is best-effort/at-most-once from the engine's perspective:
//! a missed event is resynchronized by the next state fetch, never
//! retried.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::attendance::AttendanceStatus;
use crate::models::session::SessionStatus;

/// Where an event is addressed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Session-scoped: the professor's live view and student scan pages
    /// for one session.
    Session(Uuid),
    /// Dashboard-scoped: aggregate counters for a class, keyed by class
    /// id.
    Dashboard(Uuid),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum EventPayload {
    TokenRotated {
        session_id: Uuid,
        token: String,
        expires_at: DateTime<Utc>,
    },
    SessionTransitioned {
        session_id: Uuid,
        status: SessionStatus,
        at: DateTime<Utc>,
    },
    AttendanceMarked {
        session_id: Uuid,
        student_id: Uuid,
        status: AttendanceStatus,
        minutes_late: u32,
        recorded_at: DateTime<Utc>,
        attendance_count: u32,
    },
    CountsChanged {
        session_id: Uuid,
        attendance_count: u32,
        total_enrolled: u32,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub topic: Topic,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(topic: Topic, payload: EventPayload) -> Self {
        Self { topic, payload }
    }
}
