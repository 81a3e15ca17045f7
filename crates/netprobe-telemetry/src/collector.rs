use std::{slice, sync::Arc};

use futures::stream::BoxStream;
use netprobe_metrics::usable_speeds;
use netprobe_types::timing::{SpeedInfo, TimingRecord};
use tracing::debug;

use crate::{Flush, TelemetrySource};

/// Point-in-time copy of the buffered entries. Iterating it does not touch
/// the host buffer, and `iter` may be called any number of times.
#[derive(Debug, Clone, Default)]
pub struct TimingSnapshot {
    records: Vec<TimingRecord>,
}

impl TimingSnapshot {
    pub fn iter(&self) -> slice::Iter<'_, TimingRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<'a> IntoIterator for &'a TimingSnapshot {
    type Item = &'a TimingRecord;
    type IntoIter = slice::Iter<'a, TimingRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Narrow read/clear surface over a telemetry source. Holds no state of its own.
#[derive(Clone)]
pub struct TimingCollector {
    source: Arc<dyn TelemetrySource>,
}

impl TimingCollector {
    pub fn new(source: Arc<dyn TelemetrySource>) -> Self {
        Self { source }
    }

    pub fn clear_records_for(&self, url: &str) {
        let removed = self.source.clear_by_name(url);
        if removed > 0 {
            debug!(url, removed, "Cleared stale timing entries");
        }
    }

    pub fn snapshot_all(&self) -> TimingSnapshot {
        TimingSnapshot {
            records: self.source.entries(),
        }
    }

    pub fn observe(&self) -> BoxStream<'static, Flush> {
        self.source.observe()
    }

    pub fn list_loaded_resource_speeds(&self) -> Vec<SpeedInfo> {
        usable_speeds(&self.snapshot_all())
    }
}
