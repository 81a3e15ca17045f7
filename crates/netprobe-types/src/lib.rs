//! Shared domain types for the netprobe workspace.

pub mod config;
pub mod events;
pub mod probe;
pub mod timing;

mod errors;

pub use errors::{FailureCause, NetprobeError, Result};
