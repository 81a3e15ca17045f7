use std::sync::{Arc, Mutex};

use futures::{stream::BoxStream, StreamExt};
use netprobe_types::{timing::TimingRecord, Result};
use tokio::{sync::broadcast, time::Instant};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{debug, warn};

use crate::{telemetry_error, Flush, TelemetrySource};

/// Matches the default resource-timing buffer size of browsers.
pub const DEFAULT_BUFFER_LIMIT: usize = 250;

const FLUSH_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug)]
struct TimelineBuffer {
    entries: Vec<TimingRecord>,
    limit: usize,
    overflowing: bool,
}

/// In-process performance timeline: a bounded entry buffer plus a
/// broadcast of every flush to the currently registered observers.
#[derive(Debug)]
pub struct ResourceTimeline {
    origin: Instant,
    buffer: Mutex<TimelineBuffer>,
    tx: broadcast::Sender<Flush>,
}

impl Default for ResourceTimeline {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceTimeline {
    pub fn new() -> Self {
        Self::with_buffer_limit(DEFAULT_BUFFER_LIMIT)
    }

    pub fn with_buffer_limit(limit: usize) -> Self {
        let (tx, _) = broadcast::channel(FLUSH_CHANNEL_CAPACITY);
        Self {
            origin: Instant::now(),
            buffer: Mutex::new(TimelineBuffer {
                entries: Vec::new(),
                limit,
                overflowing: false,
            }),
            tx,
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Milliseconds elapsed since the timeline was created.
    pub fn now_ms(&self) -> f64 {
        Instant::now().duration_since(self.origin).as_secs_f64() * 1000.0
    }

    pub fn record(&self, entry: TimingRecord) -> Result<()> {
        self.record_batch(vec![entry])
    }

    /// Buffer the entries (up to the limit) and deliver them to observers as one flush.
    pub fn record_batch(&self, entries: Vec<TimingRecord>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        {
            let mut buffer = self
                .buffer
                .lock()
                .map_err(|_| telemetry_error("timeline buffer poisoned"))?;
            for entry in &entries {
                if buffer.entries.len() < buffer.limit {
                    buffer.entries.push(entry.clone());
                    buffer.overflowing = false;
                } else if !buffer.overflowing {
                    buffer.overflowing = true;
                    warn!(
                        limit = buffer.limit,
                        "Resource timing buffer full; new entries are only delivered to observers"
                    );
                }
            }
        }

        let delivered = self.tx.send(Arc::new(entries)).unwrap_or(0);
        debug!(observers = delivered, "Flushed resource timing entries");
        Ok(())
    }

    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl TelemetrySource for ResourceTimeline {
    fn observe(&self) -> BoxStream<'static, Flush> {
        BroadcastStream::new(self.tx.subscribe())
            .filter_map(|flush| async move {
                match flush {
                    Ok(entries) => Some(entries),
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!(skipped, "Resource observer lagged; flushes dropped");
                        None
                    }
                }
            })
            .boxed()
    }

    fn entries(&self) -> Vec<TimingRecord> {
        self.buffer
            .lock()
            .map(|buffer| buffer.entries.clone())
            .unwrap_or_default()
    }

    fn clear_by_name(&self, name: &str) -> usize {
        let Ok(mut buffer) = self.buffer.lock() else {
            return 0;
        };
        let before = buffer.entries.len();
        buffer.entries.retain(|entry| entry.name != name);
        before - buffer.entries.len()
    }
}
