//! Probe orchestration: the per-attempt race, tier fallback and the facade.

mod attempt;
mod facade;
mod fallback;

pub use attempt::{Completion, ProbeOrchestrator};
pub use facade::NetworkSpeed;
pub use fallback::FallbackSequencer;

use netprobe_types::NetprobeError;

pub fn configuration_error(message: impl Into<String>) -> NetprobeError {
    NetprobeError::Configuration(message.into())
}
