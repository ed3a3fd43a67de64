//! Engine configuration.

/// Configuration for the attendance session engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// HMAC-SHA256 key for signing attendance tokens.
    pub token_secret: Vec<u8>,
    /// Token validity window in seconds (default: 30). Also the
    /// rotation period: a fresh token is issued each time the current
    /// one expires.
    pub token_validity_secs: u64,
    /// Minutes after the scheduled start during which redemption still
    /// counts as Present (default: 5).
    pub grace_period_mins: u32,
    /// Hard timeout in seconds after activation at which an
    /// active/paused session auto-completes (default: 3600 = 1 hour).
    pub session_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            token_secret: Vec::new(),
            token_validity_secs: 30,
            grace_period_mins: 5,
            session_timeout_secs: 3600,
        }
    }
}
