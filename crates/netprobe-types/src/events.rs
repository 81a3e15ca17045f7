use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::LoadStrategy,
    probe::{ProbeAttemptResult, Tier},
    FailureCause,
};

/// Immutable event envelope recorded for every probe lifecycle step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: ProbeEventPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProbeEventPayload {
    AttemptStarted {
        url: String,
        tier: Tier,
        strategy: LoadStrategy,
    },
    AttemptResolved(ProbeAttemptResult),
    AttemptFailed {
        url: String,
        tier: Tier,
        cause: FailureCause,
        detail: String,
    },
    FallbackPromoted {
        from: String,
        to: String,
    },
}

impl ProbeEvent {
    pub fn new(payload: ProbeEventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            payload,
        }
    }
}
