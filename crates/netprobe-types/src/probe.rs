use std::fmt;

use serde::{Deserialize, Serialize};

use crate::timing::SpeedInfo;

/// Coarse network category. Variant order is the rank order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    Unknown,
    Slow,
    Medium,
    Fast,
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NetworkType::Unknown => "unknown",
            NetworkType::Slow => "slow",
            NetworkType::Medium => "medium",
            NetworkType::Fast => "fast",
        };
        f.write_str(label)
    }
}

/// Which fallback candidate an attempt targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Local,
    Public,
}

impl Tier {
    pub fn is_local(self) -> bool {
        matches!(self, Tier::Local)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Local => f.write_str("local"),
            Tier::Public => f.write_str("public"),
        }
    }
}

/// Result of one successful probe attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeAttemptResult {
    pub speed_mbps: f64,
    pub speed_kbps: f64,
    pub network_type: NetworkType,
    pub is_local_tier: bool,
    pub duration_ms: f64,
    pub transfer_size_bytes: u64,
    pub resource_url: String,
}

impl ProbeAttemptResult {
    pub fn from_speed(
        speed: &SpeedInfo,
        network_type: NetworkType,
        tier: Tier,
        resource_url: impl Into<String>,
    ) -> Self {
        Self {
            speed_mbps: speed.speed_mbps,
            speed_kbps: speed.speed_kbps,
            network_type,
            is_local_tier: tier.is_local(),
            duration_ms: speed.download_time_ms,
            transfer_size_bytes: speed.transfer_size,
            resource_url: resource_url.into(),
        }
    }

    pub fn tier(&self) -> Tier {
        if self.is_local_tier {
            Tier::Local
        } else {
            Tier::Public
        }
    }
}

/// Terminal event of a single attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    Resolved(ProbeAttemptResult),
    LoadFailed(String),
    TimedOut,
}

impl ProbeOutcome {
    pub fn is_resolved(&self) -> bool {
        matches!(self, ProbeOutcome::Resolved(_))
    }
}
