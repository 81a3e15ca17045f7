//! Operational helpers: logging setup and the in-memory probe journal.

use std::sync::Arc;

use netprobe_types::{
    config::OpsConfig,
    events::{ProbeEvent, ProbeEventPayload},
    probe::ProbeAttemptResult,
    NetprobeError, Result,
};
use tokio::sync::Mutex;
use tracing_subscriber::{fmt, EnvFilter};

pub fn init_tracing(config: &OpsConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.log_level.clone())
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|err| NetprobeError::Ops(format!("failed to create log filter: {err}")))?;

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| NetprobeError::Ops(format!("tracing init error: {err}")))?;
    Ok(())
}

/// Append-only record of probe lifecycle events.
#[derive(Clone, Default)]
pub struct ProbeJournal {
    events: Arc<Mutex<Vec<ProbeEvent>>>,
}

impl ProbeJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, payload: ProbeEventPayload) {
        self.events.lock().await.push(ProbeEvent::new(payload));
    }

    pub async fn snapshot(&self) -> Vec<ProbeEvent> {
        self.events.lock().await.clone()
    }

    /// Resolved attempts only, oldest first.
    pub async fn results(&self) -> Vec<ProbeAttemptResult> {
        self.events
            .lock()
            .await
            .iter()
            .filter_map(|event| match &event.payload {
                ProbeEventPayload::AttemptResolved(result) => Some(result.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.events.lock().await.len()
    }
}
