//! Resource-timing telemetry: the host timeline and the views built on it.

use std::sync::Arc;

use futures::stream::BoxStream;
use netprobe_types::{timing::TimingRecord, NetprobeError};

mod collector;
mod registry;
mod timeline;

pub use collector::{TimingCollector, TimingSnapshot};
pub use registry::{ObservationHandle, ResourceObservationRegistry};
pub use timeline::{ResourceTimeline, DEFAULT_BUFFER_LIMIT};

/// One delivery of newly reported entries to an observer.
pub type Flush = Arc<Vec<TimingRecord>>;

/// Host-side source of resource-timing entries.
///
/// `observe` registers before it returns: every entry recorded after the
/// call is delivered on the stream, nothing recorded before it is.
pub trait TelemetrySource: Send + Sync {
    fn observe(&self) -> BoxStream<'static, Flush>;
    fn entries(&self) -> Vec<TimingRecord>;
    fn clear_by_name(&self, name: &str) -> usize;
}

pub fn telemetry_error(message: impl Into<String>) -> NetprobeError {
    NetprobeError::Telemetry(message.into())
}
