use serde::{Deserialize, Serialize};

/// One host-reported fact about a completed resource load.
///
/// Timestamps are milliseconds relative to the timeline origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingRecord {
    pub name: String,
    pub transfer_size: u64,
    pub response_start: f64,
    pub response_end: f64,
}

impl TimingRecord {
    pub fn new(
        name: impl Into<String>,
        transfer_size: u64,
        response_start: f64,
        response_end: f64,
    ) -> Self {
        Self {
            name: name.into(),
            transfer_size,
            response_start,
            response_end,
        }
    }

    pub fn download_time_ms(&self) -> f64 {
        self.response_end - self.response_start
    }
}

/// Throughput derived from a single timing record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeedInfo {
    pub name: String,
    pub speed_mbps: f64,
    pub speed_kbps: f64,
    pub download_time_ms: f64,
    pub transfer_size: u64,
}
