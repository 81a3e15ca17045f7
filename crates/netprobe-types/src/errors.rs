use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T, E = NetprobeError> = std::result::Result<T, E>;

/// Unified error type covering configuration, probe and operational failures.
#[derive(Debug, Error)]
pub enum NetprobeError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("resource load failed for {url}: {reason}")]
    Load { url: String, reason: String },
    #[error("probe timed out after {timeout_ms}ms: {url}")]
    Timeout { url: String, timeout_ms: u64 },
    #[error("telemetry error: {0}")]
    Telemetry(String),
    #[error("operational error: {0}")]
    Ops(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Why a probe attempt failed, as surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureCause {
    LoadError,
    Timeout,
}

impl NetprobeError {
    /// Attempt-level cause, `None` for errors that never reached an attempt.
    pub fn failure_cause(&self) -> Option<FailureCause> {
        match self {
            NetprobeError::Load { .. } => Some(FailureCause::LoadError),
            NetprobeError::Timeout { .. } => Some(FailureCause::Timeout),
            _ => None,
        }
    }

    /// URL of the attempt that failed, if any.
    pub fn attempted_url(&self) -> Option<&str> {
        match self {
            NetprobeError::Load { url, .. } | NetprobeError::Timeout { url, .. } => Some(url),
            _ => None,
        }
    }
}
