//! Rollcall Core — domain models, error taxonomy, and the store/bus
//! contracts consumed by the attendance engine.

pub mod error;
pub mod event;
pub mod models;
pub mod store;

pub use error::{RollcallError, RollcallResult};
