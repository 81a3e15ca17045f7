use std::sync::Arc;

use netprobe_loader::ResourceLoader;
use netprobe_ops::ProbeJournal;
use netprobe_telemetry::TimingCollector;
use netprobe_types::{
    config::ProbeOptions,
    events::ProbeEventPayload,
    probe::{ProbeAttemptResult, ProbeOutcome, Tier},
    FailureCause, Result,
};
use tracing::info;

use crate::attempt::{outcome_into_result, ProbeOrchestrator};

/// Runs the local-tier attempt (when configured) and falls back to the public tier.
///
/// Options are validated once, at construction; a sequencer never holds
/// options that failed validation.
#[derive(Clone)]
pub struct FallbackSequencer {
    options: ProbeOptions,
    orchestrator: ProbeOrchestrator,
    journal: ProbeJournal,
}

impl FallbackSequencer {
    pub fn new(
        options: ProbeOptions,
        collector: TimingCollector,
        loader: Arc<dyn ResourceLoader>,
        journal: ProbeJournal,
    ) -> Result<Self> {
        options.validate()?;
        let orchestrator = ProbeOrchestrator::new(&options, collector, loader);
        Ok(Self {
            options,
            orchestrator,
            journal,
        })
    }

    pub fn options(&self) -> &ProbeOptions {
        &self.options
    }

    pub fn journal(&self) -> &ProbeJournal {
        &self.journal
    }

    pub async fn run(&self) -> Result<ProbeAttemptResult> {
        if self.options.auto_detect_fallback {
            if let Some(local_url) = &self.options.local_url {
                match self.attempt(local_url, Tier::Local).await {
                    ProbeOutcome::Resolved(result) => return Ok(result),
                    failed => {
                        info!(
                            local_url = %local_url,
                            public_url = %self.options.public_url,
                            outcome = ?failed,
                            "Local probe failed; falling back to public tier"
                        );
                        self.journal
                            .record(ProbeEventPayload::FallbackPromoted {
                                from: local_url.clone(),
                                to: self.options.public_url.clone(),
                            })
                            .await;
                    }
                }
            }
        }

        let public_url = &self.options.public_url;
        let outcome = self.attempt(public_url, Tier::Public).await;
        outcome_into_result(outcome, public_url, self.orchestrator.timeout())
    }

    async fn attempt(&self, url: &str, tier: Tier) -> ProbeOutcome {
        self.journal
            .record(ProbeEventPayload::AttemptStarted {
                url: url.to_string(),
                tier,
                strategy: self.orchestrator.loader().strategy(),
            })
            .await;

        let outcome = self.orchestrator.probe(url, tier).await;

        let payload = match &outcome {
            ProbeOutcome::Resolved(result) => ProbeEventPayload::AttemptResolved(result.clone()),
            ProbeOutcome::LoadFailed(reason) => ProbeEventPayload::AttemptFailed {
                url: url.to_string(),
                tier,
                cause: FailureCause::LoadError,
                detail: reason.clone(),
            },
            ProbeOutcome::TimedOut => ProbeEventPayload::AttemptFailed {
                url: url.to_string(),
                tier,
                cause: FailureCause::Timeout,
                detail: format!("no usable timing entry within {}ms", self.options.timeout_ms),
            },
        };
        self.journal.record(payload).await;
        outcome
    }
}
