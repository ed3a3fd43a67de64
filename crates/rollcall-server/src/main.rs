//! Rollcall Server — application entry point.
//!
//! Wires the attendance engine to its collaborators: SurrealDB-backed
//! stores, the in-process event bus, and the system clock. The request
//! surface (HTTP/WebSocket) is a separate concern and not mounted
//! here.

mod events;

use std::sync::Arc;

use rollcall_db::repository::{
    SurrealAttendanceStore, SurrealEnrollmentStore, SurrealSessionStore,
};
use rollcall_db::{DbConfig, DbManager};
use rollcall_engine::{EngineConfig, SessionEngine, SystemClock};
use tracing_subscriber::EnvFilter;

use crate::events::BroadcastEventBus;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

fn db_config_from_env() -> DbConfig {
    let defaults = DbConfig::default();
    DbConfig {
        url: env_or("ROLLCALL_DB_URL", &defaults.url),
        namespace: env_or("ROLLCALL_DB_NS", &defaults.namespace),
        database: env_or("ROLLCALL_DB_NAME", &defaults.database),
        username: env_or("ROLLCALL_DB_USER", &defaults.username),
        password: env_or("ROLLCALL_DB_PASS", &defaults.password),
    }
}

fn engine_config_from_env() -> EngineConfig {
    let defaults = EngineConfig::default();
    let token_secret = match std::env::var("ROLLCALL_TOKEN_SECRET") {
        Ok(hex_key) => match hex::decode(&hex_key) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(error = %err, "ROLLCALL_TOKEN_SECRET is not valid hex; generating an ephemeral key");
                random_secret()
            }
        },
        Err(_) => {
            tracing::warn!(
                "ROLLCALL_TOKEN_SECRET not set; generating an ephemeral key \
                 (tokens will not survive a restart)"
            );
            random_secret()
        }
    };

    EngineConfig {
        token_secret,
        token_validity_secs: env_parse("ROLLCALL_TOKEN_VALIDITY_SECS", defaults.token_validity_secs),
        grace_period_mins: env_parse("ROLLCALL_GRACE_PERIOD_MINS", defaults.grace_period_mins),
        session_timeout_secs: env_parse(
            "ROLLCALL_SESSION_TIMEOUT_SECS",
            defaults.session_timeout_secs,
        ),
    }
}

fn random_secret() -> Vec<u8> {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rand::Rng::random(&mut rng);
    bytes.to_vec()
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("rollcall=info".parse().unwrap()),
        )
        .json()
        .init();

    tracing::info!("Starting Rollcall server...");

    let db_config = db_config_from_env();
    let engine_config = engine_config_from_env();

    let manager = match DbManager::connect(&db_config).await {
        Ok(manager) => manager,
        Err(err) => {
            tracing::error!(error = %err, "failed to connect to SurrealDB");
            return;
        }
    };
    if let Err(err) = rollcall_db::run_migrations(manager.client()).await {
        tracing::error!(error = %err, "failed to run migrations");
        return;
    }

    let db = manager.client().clone();
    let bus = BroadcastEventBus::new(1024);
    let _engine = SessionEngine::new(
        SurrealSessionStore::new(db.clone()),
        SurrealAttendanceStore::new(db.clone()),
        SurrealEnrollmentStore::new(db),
        bus.clone(),
        Arc::new(SystemClock),
        engine_config,
    );

    tracing::info!("Rollcall engine ready");

    // TODO: mount the HTTP/WebSocket request surface on the engine
    // once the transport layer lands.

    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }

    tracing::info!("Rollcall server stopped.");
}
