//! Rollcall Engine — token issuance/verification, the session
//! lifecycle state machine, rotation scheduling, attendance recording,
//! and post-completion reconciliation.

pub mod clock;
pub mod config;
pub mod error;
pub mod lifecycle;
mod rotation;
pub mod service;
pub mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use error::EngineError;
pub use service::{CurrentToken, RedeemInput, SessionEngine};
pub use token::{PassToken, TokenCodec, TokenError};
