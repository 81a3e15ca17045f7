use std::{future, pin::Pin, sync::Arc, time::Duration};

use futures::{stream::BoxStream, StreamExt};
use netprobe_loader::{cache_bust, ResourceLoader};
use netprobe_metrics::{classify, compute_speed};
use netprobe_telemetry::{Flush, TimingCollector};
use netprobe_types::{
    config::{ProbeOptions, Thresholds},
    probe::{ProbeAttemptResult, ProbeOutcome, Tier},
    timing::TimingRecord,
    NetprobeError, Result,
};
use tokio::time::{sleep, Sleep};
use tracing::{debug, info, warn};

/// Single-assignment slot for the terminal event of one attempt.
///
/// The first `resolve` wins; every later call is ignored and reports `false`.
#[derive(Debug, Default)]
pub struct Completion {
    outcome: Option<ProbeOutcome>,
}

impl Completion {
    pub fn resolve(&mut self, outcome: ProbeOutcome) -> bool {
        if self.outcome.is_some() {
            debug!(?outcome, "Ignoring event after attempt already terminated");
            return false;
        }
        self.outcome = Some(outcome);
        true
    }

    pub fn is_settled(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn outcome(&self) -> Option<&ProbeOutcome> {
        self.outcome.as_ref()
    }

    pub fn into_outcome(self) -> Option<ProbeOutcome> {
        self.outcome
    }
}

/// Observer registration and pending timer held by one armed attempt.
struct AttemptResources {
    observer: Option<BoxStream<'static, Flush>>,
    timer: Option<Pin<Box<Sleep>>>,
}

impl AttemptResources {
    fn arm(observer: BoxStream<'static, Flush>, timeout: Duration) -> Self {
        Self {
            observer: Some(observer),
            timer: Some(Box::pin(sleep(timeout))),
        }
    }

    /// Disconnect the observer and cancel the timer. Only the first call does anything.
    fn release(&mut self) -> bool {
        let observer = self.observer.take();
        let timer = self.timer.take();
        observer.is_some() || timer.is_some()
    }
}

impl Drop for AttemptResources {
    fn drop(&mut self) {
        self.release();
    }
}

async fn next_flush(observer: &mut Option<BoxStream<'static, Flush>>) -> Option<Flush> {
    match observer {
        Some(stream) => stream.next().await,
        None => future::pending().await,
    }
}

async fn timer_elapsed(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(deadline) => deadline.as_mut().await,
        None => future::pending().await,
    }
}

/// Runs one probe attempt: observe, arm the timer, load, and resolve once.
#[derive(Clone)]
pub struct ProbeOrchestrator {
    collector: TimingCollector,
    loader: Arc<dyn ResourceLoader>,
    thresholds: Thresholds,
    timeout: Duration,
}

impl ProbeOrchestrator {
    pub fn new(
        options: &ProbeOptions,
        collector: TimingCollector,
        loader: Arc<dyn ResourceLoader>,
    ) -> Self {
        Self {
            collector,
            loader,
            thresholds: options.thresholds,
            timeout: options.timeout(),
        }
    }

    pub fn loader(&self) -> &Arc<dyn ResourceLoader> {
        &self.loader
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn probe(&self, url: &str, tier: Tier) -> ProbeOutcome {
        let target = cache_bust(url);
        self.collector.clear_records_for(&target);

        let mut resources = AttemptResources::arm(self.collector.observe(), self.timeout);
        info!(
            url,
            %tier,
            strategy = ?self.loader.strategy(),
            timeout_ms = self.timeout.as_millis() as u64,
            "Probe attempt armed"
        );

        // A timeout leaves the load running; its late result is dropped with the handle.
        let loader = Arc::clone(&self.loader);
        let load_url = target.clone();
        let mut load = tokio::spawn(async move { loader.load(&load_url).await });
        let mut load_pending = true;

        let mut completion = Completion::default();
        while !completion.is_settled() {
            let event = tokio::select! {
                flush = next_flush(&mut resources.observer), if resources.observer.is_some() => {
                    match flush {
                        Some(entries) => self.match_flush(&entries, url, tier).map(ProbeOutcome::Resolved),
                        None => {
                            warn!(url, "Telemetry source closed; waiting on load or timeout");
                            resources.observer = None;
                            None
                        }
                    }
                }
                joined = &mut load, if load_pending => {
                    load_pending = false;
                    match joined {
                        Ok(Ok(())) => {
                            debug!(url, "Probe load settled; awaiting timing entry");
                            None
                        }
                        Ok(Err(failure)) => Some(ProbeOutcome::LoadFailed(failure.to_string())),
                        Err(err) => Some(ProbeOutcome::LoadFailed(format!("loader task failed: {err}"))),
                    }
                }
                _ = timer_elapsed(&mut resources.timer) => Some(ProbeOutcome::TimedOut),
            };

            if let Some(outcome) = event {
                if completion.resolve(outcome) {
                    resources.release();
                }
            }
        }

        let outcome = completion.into_outcome().unwrap_or(ProbeOutcome::TimedOut);
        match &outcome {
            ProbeOutcome::Resolved(result) => info!(
                url,
                %tier,
                speed_mbps = result.speed_mbps,
                network_type = %result.network_type,
                "Probe attempt resolved"
            ),
            ProbeOutcome::LoadFailed(reason) => warn!(url, %tier, reason = %reason, "Probe load failed"),
            ProbeOutcome::TimedOut => warn!(url, %tier, "Probe attempt timed out"),
        }
        outcome
    }

    /// Like `probe`, with failures mapped onto the caller-facing error type.
    pub async fn probe_result(&self, url: &str, tier: Tier) -> Result<ProbeAttemptResult> {
        let outcome = self.probe(url, tier).await;
        outcome_into_result(outcome, url, self.timeout)
    }

    /// First entry naming `url` that carries a usable speed, if any.
    fn match_flush(&self, flush: &[TimingRecord], url: &str, tier: Tier) -> Option<ProbeAttemptResult> {
        let speed = flush
            .iter()
            .filter(|entry| entry.name.contains(url))
            .find_map(|entry| {
                let speed = compute_speed(entry);
                if speed.is_none() {
                    debug!(name = %entry.name, transfer_size = entry.transfer_size, "Skipping timing entry without usable signal");
                }
                speed
            })?;
        let network_type = classify(speed.speed_mbps, &self.thresholds);
        Some(ProbeAttemptResult::from_speed(&speed, network_type, tier, url))
    }
}

pub(crate) fn outcome_into_result(
    outcome: ProbeOutcome,
    url: &str,
    timeout: Duration,
) -> Result<ProbeAttemptResult> {
    match outcome {
        ProbeOutcome::Resolved(result) => Ok(result),
        ProbeOutcome::LoadFailed(reason) => Err(NetprobeError::Load {
            url: url.to_string(),
            reason,
        }),
        ProbeOutcome::TimedOut => Err(NetprobeError::Timeout {
            url: url.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[test]
    fn completion_accepts_first_outcome_only() {
        let mut completion = Completion::default();
        assert!(!completion.is_settled());
        assert!(completion.resolve(ProbeOutcome::TimedOut));
        assert!(!completion.resolve(ProbeOutcome::LoadFailed("late".into())));
        assert!(!completion.resolve(ProbeOutcome::TimedOut));
        assert_eq!(completion.outcome(), Some(&ProbeOutcome::TimedOut));
        assert_eq!(completion.into_outcome(), Some(ProbeOutcome::TimedOut));
    }

    #[tokio::test]
    async fn resources_release_exactly_once() {
        let mut resources =
            AttemptResources::arm(stream::empty().boxed(), Duration::from_millis(10));
        assert!(resources.release());
        assert!(!resources.release());
        assert!(resources.observer.is_none());
        assert!(resources.timer.is_none());
    }

    #[test]
    fn outcomes_map_to_typed_errors() {
        let timeout = Duration::from_millis(500);
        let err = outcome_into_result(ProbeOutcome::TimedOut, "https://cdn.test/a.jpg", timeout)
            .unwrap_err();
        assert!(matches!(
            err,
            NetprobeError::Timeout { ref url, timeout_ms: 500 } if url == "https://cdn.test/a.jpg"
        ));

        let err = outcome_into_result(
            ProbeOutcome::LoadFailed("HTTP status 404".into()),
            "https://cdn.test/a.jpg",
            timeout,
        )
        .unwrap_err();
        assert!(matches!(err, NetprobeError::Load { ref reason, .. } if reason == "HTTP status 404"));
    }
}
