use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use async_stream::stream;
use futures::{stream::BoxStream, StreamExt};
use netprobe_types::timing::TimingRecord;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::TelemetrySource;

/// Standing subscriptions over resource entries, matched by name substring.
#[derive(Clone)]
pub struct ResourceObservationRegistry {
    source: Arc<dyn TelemetrySource>,
}

impl ResourceObservationRegistry {
    pub fn new(source: Arc<dyn TelemetrySource>) -> Self {
        Self { source }
    }

    /// Forward every entry whose name contains `pattern` to `callback` until
    /// the returned handle is unsubscribed. Must be called inside a tokio
    /// runtime. Dropping the handle leaves the subscription running.
    pub fn subscribe<F>(&self, pattern: impl Into<String>, mut callback: F) -> ObservationHandle
    where
        F: FnMut(&TimingRecord) + Send + 'static,
    {
        let pattern = pattern.into();
        let active = Arc::new(AtomicBool::new(true));
        let mut matches = self.watch(pattern.clone());
        let task_active = Arc::clone(&active);
        let task = tokio::spawn(async move {
            while let Some(record) = matches.next().await {
                if !task_active.load(Ordering::Acquire) {
                    break;
                }
                callback(&record);
            }
        });
        info!(pattern = %pattern, "Resource subscription registered");

        ObservationHandle {
            pattern,
            active,
            task: Some(task),
        }
    }

    /// Stream of entries whose name contains `pattern`. Registered before return.
    pub fn watch(&self, pattern: impl Into<String>) -> BoxStream<'static, TimingRecord> {
        let pattern = pattern.into();
        let mut flushes = self.source.observe();
        stream! {
            while let Some(flush) = flushes.next().await {
                for record in flush.iter().filter(|record| record.name.contains(&pattern)) {
                    yield record.clone();
                }
            }
        }
        .boxed()
    }
}

/// Caller-owned handle for one subscription.
#[derive(Debug)]
pub struct ObservationHandle {
    pattern: String,
    active: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl ObservationHandle {
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Disconnect the underlying observer. Repeated calls do nothing.
    pub fn unsubscribe(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        self.active.store(false, Ordering::Release);
        task.abort();
        debug!(pattern = %self.pattern, "Resource subscription cancelled");
    }
}
