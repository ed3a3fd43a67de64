//! SurrealDB implementation of [`SessionStore`].
//!
//! Every status transition is a single conditional UPDATE: the
//! database row, not any previously-read value, decides whether a
//! transition is legal. The counter bump is an in-database `+= 1`.

use chrono::{DateTime, Utc};
use rollcall_core::error::RollcallResult;
use rollcall_core::models::session::{
    ClassSession, CreateClassSession, SessionChange, SessionStatus,
};
use rollcall_core::store::SessionStore;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct SessionRow {
    class_id: String,
    scheduled_start_at: DateTime<Utc>,
    scheduled_end_at: DateTime<Utc>,
    status: String,
    is_active: bool,
    current_token: Option<String>,
    token_expires_at: Option<DateTime<Utc>>,
    attendance_count: u32,
    total_enrolled: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn parse_status(s: &str) -> Result<SessionStatus, DbError> {
    match s {
        "Scheduled" => Ok(SessionStatus::Scheduled),
        "Active" => Ok(SessionStatus::Active),
        "Paused" => Ok(SessionStatus::Paused),
        "Completed" => Ok(SessionStatus::Completed),
        "Cancelled" => Ok(SessionStatus::Cancelled),
        other => Err(DbError::Migration(format!(
            "unknown session status: {other}"
        ))),
    }
}

fn status_to_string(s: SessionStatus) -> &'static str {
    match s {
        SessionStatus::Scheduled => "Scheduled",
        SessionStatus::Active => "Active",
        SessionStatus::Paused => "Paused",
        SessionStatus::Completed => "Completed",
        SessionStatus::Cancelled => "Cancelled",
    }
}

impl SessionRow {
    fn into_session(self, id: Uuid) -> Result<ClassSession, DbError> {
        let class_id = Uuid::parse_str(&self.class_id)
            .map_err(|e| DbError::Migration(format!("invalid class UUID: {e}")))?;
        Ok(ClassSession {
            id,
            class_id,
            scheduled_start_at: self.scheduled_start_at,
            scheduled_end_at: self.scheduled_end_at,
            status: parse_status(&self.status)?,
            is_active: self.is_active,
            current_token: self.current_token,
            token_expires_at: self.token_expires_at,
            attendance_count: self.attendance_count,
            total_enrolled: self.total_enrolled,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the session store.
#[derive(Clone)]
pub struct SurrealSessionStore<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealSessionStore<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch(&self, id: Uuid) -> Result<ClassSession, DbError> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('class_session', $id)")
            .bind(("id", id_str.clone()))
            .await?;

        let rows: Vec<SessionRow> = result.take(0)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "class_session".into(),
            id: id_str,
        })?;

        row.into_session(id)
    }
}

impl<C: Connection> SessionStore for SurrealSessionStore<C> {
    async fn create(&self, input: CreateClassSession) -> RollcallResult<ClassSession> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('class_session', $id) SET \
                 class_id = $class_id, \
                 scheduled_start_at = $scheduled_start_at, \
                 scheduled_end_at = $scheduled_end_at, \
                 status = 'Scheduled', \
                 is_active = false, \
                 attendance_count = 0, \
                 total_enrolled = 0",
            )
            .bind(("id", id_str.clone()))
            .bind(("class_id", input.class_id.to_string()))
            .bind(("scheduled_start_at", input.scheduled_start_at))
            .bind(("scheduled_end_at", input.scheduled_end_at))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        let rows: Vec<SessionRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "class_session".into(),
            id: id_str,
        })?;

        row.into_session(id).map_err(Into::into)
    }

    async fn get(&self, id: Uuid) -> RollcallResult<ClassSession> {
        self.fetch(id).await.map_err(Into::into)
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: &[SessionStatus],
        change: SessionChange,
    ) -> RollcallResult<ClassSession> {
        let expected_strs: Vec<String> = expected
            .iter()
            .map(|s| status_to_string(*s).to_string())
            .collect();
        let is_active = change.new_status == SessionStatus::Active;

        let mut sql = String::from(
            "UPDATE type::record('class_session', $id) SET \
             status = $new_status, \
             is_active = $is_active, \
             current_token = $current_token, \
             token_expires_at = $token_expires_at, \
             updated_at = time::now()",
        );
        if change.total_enrolled.is_some() {
            sql.push_str(", total_enrolled = $total_enrolled");
        }
        sql.push_str(" WHERE status IN $expected RETURN AFTER");

        let mut query = self
            .db
            .query(sql)
            .bind(("id", id.to_string()))
            .bind(("new_status", status_to_string(change.new_status)))
            .bind(("is_active", is_active))
            .bind(("current_token", change.current_token))
            .bind(("token_expires_at", change.token_expires_at))
            .bind(("expected", expected_strs));
        if let Some(total) = change.total_enrolled {
            query = query.bind(("total_enrolled", total));
        }

        let mut result = query.await.map_err(DbError::from)?;
        let rows: Vec<SessionRow> = result.take(0).map_err(DbError::from)?;

        match rows.into_iter().next() {
            Some(row) => row.into_session(id).map_err(Into::into),
            // No row matched: distinguish a wrong state from a
            // missing session.
            None => {
                let current = self.fetch(id).await?;
                Err(DbError::PreconditionFailed {
                    entity: "class_session".into(),
                    detail: format!(
                        "status is {}, expected one of {:?}",
                        status_to_string(current.status),
                        expected
                            .iter()
                            .map(|s| status_to_string(*s))
                            .collect::<Vec<_>>(),
                    ),
                }
                .into())
            }
        }
    }

    async fn set_current_token(
        &self,
        id: Uuid,
        token: String,
        expires_at: DateTime<Utc>,
    ) -> RollcallResult<ClassSession> {
        let mut result = self
            .db
            .query(
                "UPDATE type::record('class_session', $id) SET \
                 current_token = $new_token, \
                 token_expires_at = $expires_at, \
                 updated_at = time::now() \
                 WHERE status = 'Active' RETURN AFTER",
            )
            .bind(("id", id.to_string()))
            .bind(("new_token", token))
            .bind(("expires_at", expires_at))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SessionRow> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => row.into_session(id).map_err(Into::into),
            None => {
                let current = self.fetch(id).await?;
                Err(DbError::PreconditionFailed {
                    entity: "class_session".into(),
                    detail: format!(
                        "cannot place token on {} session",
                        status_to_string(current.status),
                    ),
                }
                .into())
            }
        }
    }

    async fn increment_attendance_count(&self, id: Uuid) -> RollcallResult<ClassSession> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "UPDATE type::record('class_session', $id) SET \
                 attendance_count += 1, \
                 updated_at = time::now() \
                 RETURN AFTER",
            )
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SessionRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "class_session".into(),
            id: id_str,
        })?;

        row.into_session(id).map_err(Into::into)
    }
}
