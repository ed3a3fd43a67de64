//! The session lifecycle transition table.
//!
//! `scheduled → active ⇄ paused → completed`, with `cancelled`
//! reachable from every non-terminal state. Each constant names the
//! source states from which one transition is legal; the engine passes
//! it as the expected-status set of the store's compare-and-set, which
//! is the sole enforcement point. No status read before the write is
//! trusted.

use rollcall_core::models::session::SessionStatus;

pub const ACTIVATE_FROM: &[SessionStatus] = &[SessionStatus::Scheduled];
pub const PAUSE_FROM: &[SessionStatus] = &[SessionStatus::Active];
pub const RESUME_FROM: &[SessionStatus] = &[SessionStatus::Paused];
pub const COMPLETE_FROM: &[SessionStatus] = &[SessionStatus::Active, SessionStatus::Paused];
pub const CANCEL_FROM: &[SessionStatus] = &[
    SessionStatus::Scheduled,
    SessionStatus::Active,
    SessionStatus::Paused,
];

/// Whether a direct transition `from → to` appears in the table.
pub fn is_legal(from: SessionStatus, to: SessionStatus) -> bool {
    let sources: &[SessionStatus] = match to {
        SessionStatus::Scheduled => &[],
        SessionStatus::Active => &[SessionStatus::Scheduled, SessionStatus::Paused],
        SessionStatus::Paused => PAUSE_FROM,
        SessionStatus::Completed => COMPLETE_FROM,
        SessionStatus::Cancelled => CANCEL_FROM,
    };
    sources.contains(&from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionStatus::*;

    const ALL: [SessionStatus; 5] = [Scheduled, Active, Paused, Completed, Cancelled];

    #[test]
    fn terminal_states_have_no_exits() {
        for from in [Completed, Cancelled] {
            for to in ALL {
                assert!(!is_legal(from, to), "{from:?} -> {to:?} must be illegal");
            }
        }
    }

    #[test]
    fn nothing_returns_to_scheduled() {
        for from in ALL {
            assert!(!is_legal(from, Scheduled));
        }
    }

    #[test]
    fn transition_table_is_exact() {
        let legal = [
            (Scheduled, Active),
            (Active, Paused),
            (Paused, Active),
            (Active, Completed),
            (Paused, Completed),
            (Scheduled, Cancelled),
            (Active, Cancelled),
            (Paused, Cancelled),
        ];
        for from in ALL {
            for to in ALL {
                assert_eq!(
                    is_legal(from, to),
                    legal.contains(&(from, to)),
                    "disagreement on {from:?} -> {to:?}"
                );
            }
        }
    }
}
