//! Class session domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a class session.
///
/// `Completed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    Scheduled,
    Active,
    Paused,
    Completed,
    Cancelled,
}

impl SessionStatus {
    /// True for `Completed` and `Cancelled`; no transition leaves
    /// these states.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Cancelled)
    }
}

/// One scheduled class meeting whose attendance window is managed by
/// the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassSession {
    pub id: Uuid,
    pub class_id: Uuid,
    /// Official start of the meeting. Lateness is judged against this,
    /// not against the time the instructor activated the session.
    pub scheduled_start_at: DateTime<Utc>,
    pub scheduled_end_at: DateTime<Utc>,
    pub status: SessionStatus,
    /// Redundant cache: true iff `status == Active`.
    pub is_active: bool,
    /// The one live attendance token. `None` unless status is Active.
    pub current_token: Option<String>,
    /// Expiry of `current_token`. `None` unless status is Active.
    pub token_expires_at: Option<DateTime<Utc>>,
    pub attendance_count: u32,
    pub total_enrolled: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a session. Sessions are batch-generated by an
/// external scheduling process; they always start out `Scheduled` with
/// an empty token slot and zeroed counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateClassSession {
    pub class_id: Uuid,
    pub scheduled_start_at: DateTime<Utc>,
    pub scheduled_end_at: DateTime<Utc>,
}

/// The fields written together with a status compare-and-set.
///
/// `current_token`/`token_expires_at` are written as given (so `None`
/// clears the token slot); `total_enrolled` is only written when
/// `Some`. The store derives `is_active` from `new_status`, so callers
/// cannot desynchronize the cache.
#[derive(Debug, Clone)]
pub struct SessionChange {
    pub new_status: SessionStatus,
    pub current_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub total_enrolled: Option<u32>,
}

impl SessionChange {
    /// A transition to `new_status` that clears the token slot.
    pub fn to(new_status: SessionStatus) -> Self {
        Self {
            new_status,
            current_token: None,
            token_expires_at: None,
            total_enrolled: None,
        }
    }

    pub fn with_token(mut self, token: String, expires_at: DateTime<Utc>) -> Self {
        self.current_token = Some(token);
        self.token_expires_at = Some(expires_at);
        self
    }

    pub fn with_total_enrolled(mut self, total: u32) -> Self {
        self.total_enrolled = Some(total);
        self
    }
}
