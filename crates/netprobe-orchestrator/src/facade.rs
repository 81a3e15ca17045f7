use std::sync::Arc;

use netprobe_loader::{loader_for, probe_client, ResourceLoader};
use netprobe_ops::ProbeJournal;
use netprobe_telemetry::{
    ObservationHandle, ResourceObservationRegistry, ResourceTimeline, TimingCollector,
};
use netprobe_types::{
    config::ProbeOptions,
    probe::ProbeAttemptResult,
    timing::{SpeedInfo, TimingRecord},
    Result,
};
use reqwest::Client;
use tracing::info;

use crate::{configuration_error, fallback::FallbackSequencer};

enum LoaderSource {
    Http(Client),
    Injected(Arc<dyn ResourceLoader>),
}

/// Entry point wiring the timeline, loaders and sequencer together.
pub struct NetworkSpeed {
    timeline: Arc<ResourceTimeline>,
    collector: TimingCollector,
    registry: ResourceObservationRegistry,
    journal: ProbeJournal,
    loader_source: Option<LoaderSource>,
    sequencer: Option<FallbackSequencer>,
}

impl NetworkSpeed {
    /// Configured instance using the HTTP loaders.
    pub fn new(options: ProbeOptions) -> Result<Self> {
        options.validate()?;
        let mut speed = Self::unconfigured();
        speed.loader_source = Some(LoaderSource::Http(probe_client()?));
        speed.replace_options(options)?;
        Ok(speed)
    }

    /// Instance that only offers the timeline utilities until options are supplied.
    pub fn unconfigured() -> Self {
        Self::on_timeline(ResourceTimeline::shared())
    }

    /// Configured instance with an injected timeline and loader.
    pub fn with_parts(
        options: ProbeOptions,
        timeline: Arc<ResourceTimeline>,
        loader: Arc<dyn ResourceLoader>,
    ) -> Result<Self> {
        let mut speed = Self::on_timeline(timeline);
        speed.loader_source = Some(LoaderSource::Injected(loader));
        speed.replace_options(options)?;
        Ok(speed)
    }

    fn on_timeline(timeline: Arc<ResourceTimeline>) -> Self {
        let collector = TimingCollector::new(timeline.clone());
        let registry = ResourceObservationRegistry::new(timeline.clone());
        Self {
            timeline,
            collector,
            registry,
            journal: ProbeJournal::new(),
            loader_source: None,
            sequencer: None,
        }
    }

    /// Replace the options wholesale. On error the previous options stay in effect.
    pub fn replace_options(&mut self, options: ProbeOptions) -> Result<()> {
        options.validate()?;
        let loader = match &self.loader_source {
            Some(LoaderSource::Injected(loader)) => Arc::clone(loader),
            Some(LoaderSource::Http(client)) => {
                loader_for(options.load_strategy, client.clone(), self.timeline.clone())
            }
            None => {
                let client = probe_client()?;
                let loader = loader_for(options.load_strategy, client.clone(), self.timeline.clone());
                self.loader_source = Some(LoaderSource::Http(client));
                loader
            }
        };
        info!(
            public_url = %options.public_url,
            local_url = ?options.local_url,
            strategy = ?loader.strategy(),
            "Probe options applied"
        );
        self.sequencer = Some(FallbackSequencer::new(
            options,
            self.collector.clone(),
            loader,
            self.journal.clone(),
        )?);
        Ok(())
    }

    pub fn options(&self) -> Option<&ProbeOptions> {
        self.sequencer.as_ref().map(FallbackSequencer::options)
    }

    pub async fn probe(&self) -> Result<ProbeAttemptResult> {
        let sequencer = self.sequencer.as_ref().ok_or_else(|| {
            configuration_error("probe options not configured; supply options before probing")
        })?;
        sequencer.run().await
    }

    pub fn subscribe<F>(&self, pattern: impl Into<String>, callback: F) -> ObservationHandle
    where
        F: FnMut(&TimingRecord) + Send + 'static,
    {
        self.registry.subscribe(pattern, callback)
    }

    pub fn list_loaded_resource_speeds(&self) -> Vec<SpeedInfo> {
        self.collector.list_loaded_resource_speeds()
    }

    pub fn timeline(&self) -> &Arc<ResourceTimeline> {
        &self.timeline
    }

    pub fn registry(&self) -> &ResourceObservationRegistry {
        &self.registry
    }

    pub fn journal(&self) -> &ProbeJournal {
        &self.journal
    }
}
