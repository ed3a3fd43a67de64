//! The attendance session engine — lifecycle orchestration, token
//! redemption, and reconciliation.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rollcall_core::error::RollcallError;
use rollcall_core::event::{Event, EventPayload, Topic};
use rollcall_core::models::attendance::{
    AttendanceRecord, AttendanceStatus, CreateAttendanceRecord,
};
use rollcall_core::models::session::{ClassSession, SessionChange, SessionStatus};
use rollcall_core::store::{AttendanceStore, EnrollmentLookup, EventSink, SessionStore};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::lifecycle;
use crate::rotation::RotationRegistry;
use crate::token::{TokenCodec, TokenError};

/// Input for the redemption flow.
#[derive(Debug)]
pub struct RedeemInput {
    /// Opaque token string as scanned by the student.
    pub token: String,
    pub student_id: Uuid,
    /// Anti-abuse context: persisted with the record, never evaluated.
    pub device_fingerprint: Option<String>,
    pub network_origin: Option<String>,
}

/// The live token of an active session, for the professor's display.
#[derive(Debug, Clone)]
pub struct CurrentToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

struct Inner<S, A, E, V> {
    sessions: S,
    attendance: A,
    enrollment: E,
    events: V,
    codec: TokenCodec,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    rotation: RotationRegistry,
}

/// Attendance session engine.
///
/// Generic over the store implementations so the engine has no
/// dependency on the storage crate. Cheap to clone; clones share the
/// rotation registry.
pub struct SessionEngine<S, A, E, V> {
    inner: Arc<Inner<S, A, E, V>>,
}

impl<S, A, E, V> Clone for SessionEngine<S, A, E, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, A, E, V> SessionEngine<S, A, E, V>
where
    S: SessionStore + 'static,
    A: AttendanceStore + 'static,
    E: EnrollmentLookup + 'static,
    V: EventSink + 'static,
{
    pub fn new(
        sessions: S,
        attendance: A,
        enrollment: E,
        events: V,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        let codec = TokenCodec::new(config.token_secret.clone(), config.token_validity_secs);
        Self {
            inner: Arc::new(Inner {
                sessions,
                attendance,
                enrollment,
                events,
                codec,
                clock,
                config,
                rotation: RotationRegistry::new(),
            }),
        }
    }

    // -------------------------------------------------------------------
    // Lifecycle transitions
    // -------------------------------------------------------------------

    /// Open the attendance window: issue the first token, start
    /// rotation, and arm the hard timeout.
    pub async fn activate(&self, session_id: Uuid) -> Result<ClassSession, EngineError> {
        // 1. Read the session to learn its class, then refresh the
        //    enrolled headcount. The status itself is not trusted from
        //    this read; the compare-and-set below re-checks it.
        let session = self.inner.sessions.get(session_id).await?;
        let total_enrolled = self
            .inner
            .enrollment
            .list_active_students(session.class_id)
            .await?
            .len() as u32;

        // 2. Issue the opening token.
        let now = self.inner.clock.now();
        let issued = self.inner.codec.issue(session_id, now);

        // 3. Scheduled -> Active, atomically.
        let updated = self
            .inner
            .sessions
            .compare_and_set_status(
                session_id,
                lifecycle::ACTIVATE_FROM,
                SessionChange::to(SessionStatus::Active)
                    .with_token(issued.encoded.clone(), issued.claims.expires_at)
                    .with_total_enrolled(total_enrolled),
            )
            .await?;

        // 4. Start rotating and arm the auto-completion timer. The
        //    timer is never cancelled; it no-ops at fire time if the
        //    session already left the active/paused superstate.
        self.start_rotation(session_id).await;
        self.spawn_timeout(session_id);

        info!(%session_id, total_enrolled, "session activated");
        self.publish_transition(&updated, now).await;
        self.publish_token(session_id, &issued.encoded, issued.claims.expires_at)
            .await;
        Ok(updated)
    }

    /// Suspend redemption without closing the window. The rotation
    /// task is halted before the status flips, so no tick can land a
    /// token on the paused session.
    pub async fn pause(&self, session_id: Uuid) -> Result<ClassSession, EngineError> {
        self.inner.rotation.stop(session_id).await;

        let updated = self
            .inner
            .sessions
            .compare_and_set_status(
                session_id,
                lifecycle::PAUSE_FROM,
                SessionChange::to(SessionStatus::Paused),
            )
            .await?;

        info!(%session_id, "session paused");
        self.publish_transition(&updated, self.inner.clock.now())
            .await;
        Ok(updated)
    }

    /// Reopen a paused window with a fresh token. The hard timeout
    /// armed at activation still governs; it is not re-armed.
    pub async fn resume(&self, session_id: Uuid) -> Result<ClassSession, EngineError> {
        let now = self.inner.clock.now();
        let issued = self.inner.codec.issue(session_id, now);

        let updated = self
            .inner
            .sessions
            .compare_and_set_status(
                session_id,
                lifecycle::RESUME_FROM,
                SessionChange::to(SessionStatus::Active)
                    .with_token(issued.encoded.clone(), issued.claims.expires_at),
            )
            .await?;

        self.start_rotation(session_id).await;

        info!(%session_id, "session resumed");
        self.publish_transition(&updated, now).await;
        self.publish_token(session_id, &issued.encoded, issued.claims.expires_at)
            .await;
        Ok(updated)
    }

    /// Close the window and fill in absents for every enrolled student
    /// without a record.
    pub async fn complete(&self, session_id: Uuid) -> Result<ClassSession, EngineError> {
        self.inner.rotation.stop(session_id).await;

        let updated = self
            .inner
            .sessions
            .compare_and_set_status(
                session_id,
                lifecycle::COMPLETE_FROM,
                SessionChange::to(SessionStatus::Completed),
            )
            .await?;

        let completed_at = self.inner.clock.now();
        let absent_filled = self.reconcile(&updated, completed_at).await?;

        info!(%session_id, absent_filled, "session completed");
        self.publish_transition(&updated, completed_at).await;
        self.publish(
            Topic::Dashboard(updated.class_id),
            EventPayload::CountsChanged {
                session_id,
                attendance_count: updated.attendance_count,
                total_enrolled: updated.total_enrolled,
            },
        )
        .await;
        Ok(updated)
    }

    /// Abandon the session. Cancelled sessions carry no attendance
    /// obligation, so no reconciliation runs.
    pub async fn cancel(&self, session_id: Uuid) -> Result<ClassSession, EngineError> {
        self.inner.rotation.stop(session_id).await;

        let updated = self
            .inner
            .sessions
            .compare_and_set_status(
                session_id,
                lifecycle::CANCEL_FROM,
                SessionChange::to(SessionStatus::Cancelled),
            )
            .await?;

        info!(%session_id, "session cancelled");
        self.publish_transition(&updated, self.inner.clock.now())
            .await;
        Ok(updated)
    }

    // -------------------------------------------------------------------
    // Redemption
    // -------------------------------------------------------------------

    /// Redeem a scanned token: exactly one record per
    /// `(session, student)` ever results, and the losing side of a
    /// duplicate gets the winner's record back.
    pub async fn redeem(&self, input: RedeemInput) -> Result<AttendanceRecord, EngineError> {
        let now = self.inner.clock.now();

        // 1-2. Parse and verify. Everything except a parse failure
        //      collapses to one client-visible rejection.
        let claims = self
            .inner
            .codec
            .verify(&input.token, now)
            .map_err(|err| match err {
                TokenError::Malformed => EngineError::MalformedToken,
                TokenError::Expired | TokenError::BadSignature => EngineError::InvalidToken,
            })?;

        // 3. The session must be open. Unknown sessions answer the
        //    same as closed ones.
        let session = match self.inner.sessions.get(claims.session_id).await {
            Ok(session) => session,
            Err(RollcallError::NotFound { .. }) => return Err(EngineError::SessionNotOpen),
            Err(err) => return Err(err.into()),
        };
        if session.status != SessionStatus::Active {
            return Err(EngineError::SessionNotOpen);
        }

        // 4. Active enrollment in the session's parent class.
        let enrolled = self
            .inner
            .enrollment
            .is_actively_enrolled(input.student_id, session.class_id)
            .await?;
        if !enrolled {
            return Err(EngineError::NotEnrolled);
        }

        // 5-7. Lateness is judged against the scheduled start, not the
        //      activation time; the insert is the uniqueness authority.
        let (status, minutes_late) = grade_lateness(
            session.scheduled_start_at,
            now,
            self.inner.config.grace_period_mins,
        );
        let (record, inserted) = self
            .inner
            .attendance
            .insert_if_absent(CreateAttendanceRecord {
                session_id: session.id,
                student_id: input.student_id,
                status,
                minutes_late,
                recorded_at: now,
                device_fingerprint: input.device_fingerprint,
                network_origin: input.network_origin,
            })
            .await?;
        if !inserted {
            return Err(EngineError::AlreadyRecorded {
                existing: Box::new(record),
            });
        }

        // 8. Count and announce, only for the genuine insert.
        let updated = self
            .inner
            .sessions
            .increment_attendance_count(session.id)
            .await?;

        debug!(
            session_id = %session.id,
            student_id = %input.student_id,
            ?status,
            minutes_late,
            "attendance recorded"
        );
        self.publish(
            Topic::Session(session.id),
            EventPayload::AttendanceMarked {
                session_id: session.id,
                student_id: input.student_id,
                status,
                minutes_late,
                recorded_at: now,
                attendance_count: updated.attendance_count,
            },
        )
        .await;
        self.publish(
            Topic::Dashboard(session.class_id),
            EventPayload::CountsChanged {
                session_id: session.id,
                attendance_count: updated.attendance_count,
                total_enrolled: updated.total_enrolled,
            },
        )
        .await;

        Ok(record)
    }

    /// Instructor correction of a recorded outcome (e.g. to Excused).
    /// Audited, and allowed at most once per record.
    pub async fn override_status(
        &self,
        session_id: Uuid,
        student_id: Uuid,
        new_status: AttendanceStatus,
        changed_by: Uuid,
        reason: String,
    ) -> Result<AttendanceRecord, EngineError> {
        let record = self
            .inner
            .attendance
            .apply_override(session_id, student_id, new_status, changed_by, reason)
            .await?;
        info!(%session_id, %student_id, ?new_status, "attendance overridden");
        Ok(record)
    }

    /// Read-through for the professor view: the live token of an
    /// active session. Displays resynchronize by fetching, not by
    /// event replay.
    pub async fn current_token(&self, session_id: Uuid) -> Result<CurrentToken, EngineError> {
        let session = match self.inner.sessions.get(session_id).await {
            Ok(session) => session,
            Err(RollcallError::NotFound { .. }) => return Err(EngineError::SessionNotOpen),
            Err(err) => return Err(err.into()),
        };
        match (session.current_token, session.token_expires_at) {
            (Some(token), Some(expires_at)) if session.status == SessionStatus::Active => {
                Ok(CurrentToken { token, expires_at })
            }
            _ => Err(EngineError::SessionNotOpen),
        }
    }

    // -------------------------------------------------------------------
    // Rotation
    // -------------------------------------------------------------------

    async fn start_rotation(&self, session_id: Uuid) {
        let engine = self.clone();
        self.inner
            .rotation
            .start(session_id, move || {
                tokio::spawn(engine.run_rotation(session_id))
            })
            .await;
    }

    async fn run_rotation(self, session_id: Uuid) {
        let period = Duration::from_secs(self.inner.config.token_validity_secs);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; the transition that
        // started rotation already issued a token, so skip it.
        interval.tick().await;

        loop {
            interval.tick().await;
            match self.rotate_once(session_id).await {
                Ok(true) => {}
                Ok(false) => break,
                Err(err) => {
                    // Transient store trouble: the next tick will try
                    // again with a fresh token anyway.
                    warn!(%session_id, error = %err, "token rotation tick failed");
                }
            }
        }
        debug!(%session_id, "rotation stopped");
    }

    /// One rotation tick. Returns `Ok(false)` when the session is no
    /// longer active and rotation should end.
    async fn rotate_once(&self, session_id: Uuid) -> Result<bool, EngineError> {
        // Re-validate state across the async gap; the pre-tick status
        // is never assumed.
        let session = match self.inner.sessions.get(session_id).await {
            Ok(session) => session,
            Err(RollcallError::NotFound { .. }) => return Ok(false),
            Err(err) => return Err(err.into()),
        };
        if session.status != SessionStatus::Active {
            return Ok(false);
        }

        let now = self.inner.clock.now();
        let issued = self.inner.codec.issue(session_id, now);
        match self
            .inner
            .sessions
            .set_current_token(session_id, issued.encoded.clone(), issued.claims.expires_at)
            .await
        {
            Ok(_) => {
                self.publish_token(session_id, &issued.encoded, issued.claims.expires_at)
                    .await;
                Ok(true)
            }
            // The session closed between the read and the write; the
            // Active guard on the token slot held.
            Err(RollcallError::PreconditionFailed { .. }) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    // -------------------------------------------------------------------
    // Hard timeout
    // -------------------------------------------------------------------

    fn spawn_timeout(&self, session_id: Uuid) {
        let engine = self.clone();
        let after = Duration::from_secs(self.inner.config.session_timeout_secs);
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            engine.fire_timeout(session_id).await;
        });
    }

    /// Auto-completion at the hard timeout. Firing after the session
    /// already left the active/paused superstate is a silent no-op;
    /// the completion CAS is the cancellation check.
    async fn fire_timeout(&self, session_id: Uuid) {
        match self.complete(session_id).await {
            Ok(_) => info!(%session_id, "session auto-completed at hard timeout"),
            Err(EngineError::Store(
                RollcallError::PreconditionFailed { .. } | RollcallError::NotFound { .. },
            )) => {
                debug!(%session_id, "hard timeout fired on closed session; no-op");
            }
            Err(err) => warn!(%session_id, error = %err, "hard timeout completion failed"),
        }
    }

    // -------------------------------------------------------------------
    // Reconciliation
    // -------------------------------------------------------------------

    /// Insert an Absent record for every actively-enrolled student
    /// lacking one. Idempotent: the per-student existence check plus
    /// the storage uniqueness constraint mean a second run (or a race
    /// with a late redemption) inserts nothing extra.
    async fn reconcile(
        &self,
        session: &ClassSession,
        completed_at: DateTime<Utc>,
    ) -> Result<u32, EngineError> {
        let students = self
            .inner
            .enrollment
            .list_active_students(session.class_id)
            .await?;
        let existing: HashSet<Uuid> = self
            .inner
            .attendance
            .list_for_session(session.id)
            .await?
            .into_iter()
            .map(|record| record.student_id)
            .collect();

        let mut filled = 0u32;
        for student_id in students {
            if existing.contains(&student_id) {
                continue;
            }
            let (_, inserted) = self
                .inner
                .attendance
                .insert_if_absent(CreateAttendanceRecord {
                    session_id: session.id,
                    student_id,
                    status: AttendanceStatus::Absent,
                    minutes_late: 0,
                    recorded_at: completed_at,
                    device_fingerprint: None,
                    network_origin: None,
                })
                .await?;
            if inserted {
                filled += 1;
            }
        }
        Ok(filled)
    }

    // -------------------------------------------------------------------
    // Events
    // -------------------------------------------------------------------

    async fn publish(&self, topic: Topic, payload: EventPayload) {
        self.inner.events.publish(Event::new(topic, payload)).await;
    }

    async fn publish_transition(&self, session: &ClassSession, at: DateTime<Utc>) {
        self.publish(
            Topic::Session(session.id),
            EventPayload::SessionTransitioned {
                session_id: session.id,
                status: session.status,
                at,
            },
        )
        .await;
    }

    async fn publish_token(&self, session_id: Uuid, token: &str, expires_at: DateTime<Utc>) {
        self.publish(
            Topic::Session(session_id),
            EventPayload::TokenRotated {
                session_id,
                token: token.to_string(),
                expires_at,
            },
        )
        .await;
    }
}

/// Grade a redemption against the scheduled start: within the grace
/// period it is Present with zero minutes late, past it the full
/// (floored) minute count is recorded.
fn grade_lateness(
    scheduled_start_at: DateTime<Utc>,
    redeemed_at: DateTime<Utc>,
    grace_period_mins: u32,
) -> (AttendanceStatus, u32) {
    let seconds = (redeemed_at - scheduled_start_at).num_seconds();
    let minutes = if seconds <= 0 { 0 } else { (seconds / 60) as u32 };
    if minutes > grace_period_mins {
        (AttendanceStatus::Late, minutes)
    } else {
        (AttendanceStatus::Present, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap()
    }

    #[test]
    fn on_time_is_present() {
        let (status, minutes) = grade_lateness(start(), start(), 5);
        assert_eq!(status, AttendanceStatus::Present);
        assert_eq!(minutes, 0);
    }

    #[test]
    fn early_arrival_clamps_to_zero() {
        let early = start() - chrono::Duration::minutes(10);
        let (status, minutes) = grade_lateness(start(), early, 5);
        assert_eq!(status, AttendanceStatus::Present);
        assert_eq!(minutes, 0);
    }

    #[test]
    fn within_grace_is_present_with_zero_minutes() {
        let at = start() + chrono::Duration::minutes(2);
        let (status, minutes) = grade_lateness(start(), at, 5);
        assert_eq!(status, AttendanceStatus::Present);
        assert_eq!(minutes, 0);
    }

    #[test]
    fn grace_boundary_is_still_present() {
        let at = start() + chrono::Duration::minutes(5);
        let (status, _) = grade_lateness(start(), at, 5);
        assert_eq!(status, AttendanceStatus::Present);
    }

    #[test]
    fn past_grace_is_late_with_full_minutes() {
        let at = start() + chrono::Duration::minutes(6);
        assert_eq!(grade_lateness(start(), at, 5), (AttendanceStatus::Late, 6));

        let at = start() + chrono::Duration::minutes(9);
        assert_eq!(grade_lateness(start(), at, 5), (AttendanceStatus::Late, 9));
    }

    #[test]
    fn partial_minutes_floor() {
        let at = start() + chrono::Duration::seconds(6 * 60 + 59);
        assert_eq!(grade_lateness(start(), at, 5), (AttendanceStatus::Late, 6));
    }
}
