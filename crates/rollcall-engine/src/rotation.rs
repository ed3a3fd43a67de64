//! Registry of live rotation tasks, one per active session.
//!
//! Start is idempotent (a live task for the session wins); stop aborts
//! the task before returning, so a closing lifecycle transition cannot
//! race the next tick into leaving a fresh token on a closed session.

use std::collections::HashMap;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Default)]
pub(crate) struct RotationRegistry {
    tasks: Mutex<HashMap<Uuid, JoinHandle<()>>>,
}

impl RotationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rotation task for `session_id`, spawning it via
    /// `spawn` only if no live task exists.
    pub async fn start<F>(&self, session_id: Uuid, spawn: F)
    where
        F: FnOnce() -> JoinHandle<()>,
    {
        let mut tasks = self.tasks.lock().await;
        if let Some(existing) = tasks.get(&session_id) {
            if !existing.is_finished() {
                return;
            }
        }
        tasks.insert(session_id, spawn());
    }

    /// Abort and forget the rotation task for `session_id`, if any.
    /// The abort takes effect before this returns.
    pub async fn stop(&self, session_id: Uuid) {
        if let Some(handle) = self.tasks.lock().await.remove(&session_id) {
            handle.abort();
        }
    }

    #[cfg(test)]
    pub async fn is_rotating(&self, session_id: Uuid) -> bool {
        self.tasks
            .lock()
            .await
            .get(&session_id)
            .is_some_and(|handle| !handle.is_finished())
    }
}
