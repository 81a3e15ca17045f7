//! Probe loaders: issue the measured network load and report how it ended.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use netprobe_telemetry::ResourceTimeline;
use netprobe_types::{config::LoadStrategy, NetprobeError, Result};
use reqwest::Client;
use thiserror::Error;

mod http;

pub use http::{FetchLoader, TagLoader};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a load did not settle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadFailure {
    /// Passive loads cannot tell HTTP errors from network errors.
    #[error("resource load failed")]
    Generic,
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(String),
}

/// One network load of an already cache-busted URL.
///
/// `Ok(())` means the load settled (body fully received); it says nothing
/// about timing, which is reported separately through the timeline.
#[async_trait]
pub trait ResourceLoader: Send + Sync {
    fn strategy(&self) -> LoadStrategy;
    async fn load(&self, url: &str) -> std::result::Result<(), LoadFailure>;
}

/// `url` with a `t=<epoch millis>` token appended to defeat caches.
pub fn cache_bust(url: &str) -> String {
    cache_bust_at(url, Utc::now().timestamp_millis())
}

pub fn cache_bust_at(url: &str, epoch_ms: i64) -> String {
    format!("{url}?t={epoch_ms}")
}

/// HTTP client shared by both strategies.
pub fn probe_client() -> Result<Client> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(|err| loader_error(format!("failed to create HTTP client: {err}")))
}

pub fn loader_for(
    strategy: LoadStrategy,
    client: Client,
    timeline: Arc<ResourceTimeline>,
) -> Arc<dyn ResourceLoader> {
    match strategy {
        LoadStrategy::Tag => Arc::new(TagLoader::new(client, timeline)),
        LoadStrategy::Fetch => Arc::new(FetchLoader::new(client, timeline)),
    }
}

pub fn loader_error(message: impl Into<String>) -> NetprobeError {
    NetprobeError::Other(anyhow::Error::msg(message.into()))
}
