use std::sync::Arc;

use async_trait::async_trait;
use netprobe_telemetry::ResourceTimeline;
use netprobe_types::{config::LoadStrategy, timing::TimingRecord};
use reqwest::{
    header::{CACHE_CONTROL, PRAGMA},
    Client, RequestBuilder, Response,
};
use tracing::{debug, warn};

use crate::{LoadFailure, ResourceLoader};

/// Request plumbing shared by both strategies. Reports each fully drained
/// response to the timeline, the way a browser network stack would.
#[derive(Clone)]
struct HttpProbe {
    client: Client,
    timeline: Arc<ResourceTimeline>,
}

/// Body fully received: byte count plus the two timestamps bracketing it.
struct Drained {
    bytes: u64,
    response_start: f64,
    response_end: f64,
}

impl HttpProbe {
    async fn send(&self, request: RequestBuilder) -> Result<(Response, f64), reqwest::Error> {
        let response = request.send().await?;
        Ok((response, self.timeline.now_ms()))
    }

    async fn drain(&self, mut response: Response, response_start: f64) -> Result<Drained, reqwest::Error> {
        let mut bytes = 0u64;
        while let Some(chunk) = response.chunk().await? {
            bytes += chunk.len() as u64;
        }
        Ok(Drained {
            bytes,
            response_start,
            response_end: self.timeline.now_ms(),
        })
    }

    fn report(&self, url: &str, drained: Drained) {
        let entry = TimingRecord::new(url, drained.bytes, drained.response_start, drained.response_end);
        if let Err(err) = self.timeline.record(entry) {
            warn!(url, %err, "Failed to report resource timing");
        }
    }
}

/// Passive load, the analogue of an image tag: plain GET, no cache
/// directives, and every non-success collapses into one generic failure.
#[derive(Clone)]
pub struct TagLoader {
    http: HttpProbe,
}

impl TagLoader {
    pub fn new(client: Client, timeline: Arc<ResourceTimeline>) -> Self {
        Self {
            http: HttpProbe { client, timeline },
        }
    }
}

#[async_trait]
impl ResourceLoader for TagLoader {
    fn strategy(&self) -> LoadStrategy {
        LoadStrategy::Tag
    }

    async fn load(&self, url: &str) -> Result<(), LoadFailure> {
        let (response, response_start) = self
            .http
            .send(self.http.client.get(url))
            .await
            .map_err(|err| {
                debug!(url, %err, "Tag load transport failure");
                LoadFailure::Generic
            })?;
        if !response.status().is_success() {
            debug!(url, status = %response.status(), "Tag load rejected");
            return Err(LoadFailure::Generic);
        }
        let drained = self.http.drain(response, response_start).await.map_err(|err| {
            debug!(url, %err, "Tag load body interrupted");
            LoadFailure::Generic
        })?;
        self.http.report(url, drained);
        Ok(())
    }
}

/// Active request with caching disabled. Fails on non-2xx and only settles
/// once the body is drained, since the timing end is fixed at that point.
#[derive(Clone)]
pub struct FetchLoader {
    http: HttpProbe,
}

impl FetchLoader {
    pub fn new(client: Client, timeline: Arc<ResourceTimeline>) -> Self {
        Self {
            http: HttpProbe { client, timeline },
        }
    }
}

#[async_trait]
impl ResourceLoader for FetchLoader {
    fn strategy(&self) -> LoadStrategy {
        LoadStrategy::Fetch
    }

    async fn load(&self, url: &str) -> Result<(), LoadFailure> {
        let request = self
            .http
            .client
            .get(url)
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache");
        let (response, response_start) = self
            .http
            .send(request)
            .await
            .map_err(|err| LoadFailure::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoadFailure::Status(status.as_u16()));
        }
        let drained = self
            .http
            .drain(response, response_start)
            .await
            .map_err(|err| LoadFailure::Transport(err.to_string()))?;
        self.http.report(url, drained);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{loader_for, probe_client};
    use netprobe_telemetry::TelemetrySource;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
        task::JoinHandle,
    };

    /// Serve one canned response; the task yields the raw request head.
    async fn serve_once(status_line: &'static str, body: &'static [u8]) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let mut read = 0;
            loop {
                let n = socket.read(&mut buf[read..]).await.unwrap();
                read += n;
                if n == 0 || buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            let head = format!(
                "HTTP/1.1 {status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(body).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&buf[..read]).to_string()
        });
        (format!("http://{addr}/probe.bin?t=42"), server)
    }

    async fn closed_port_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}/probe.bin?t=1")
    }

    #[tokio::test]
    async fn fetch_drains_body_and_reports_timing() {
        let timeline = ResourceTimeline::shared();
        let loader = loader_for(LoadStrategy::Fetch, probe_client().unwrap(), timeline.clone());
        let body: &'static [u8] = &[7u8; 4096];
        let (url, server) = serve_once("200 OK", body).await;

        loader.load(&url).await.expect("fetch settles");

        let request = server.await.unwrap().to_ascii_lowercase();
        assert!(request.contains("cache-control: no-cache"));
        assert!(request.contains("pragma: no-cache"));

        let entries = timeline.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, url);
        assert_eq!(entries[0].transfer_size, 4096);
        assert!(entries[0].response_end >= entries[0].response_start);
    }

    #[tokio::test]
    async fn fetch_reports_http_status() {
        let timeline = ResourceTimeline::shared();
        let loader = FetchLoader::new(probe_client().unwrap(), timeline.clone());
        let (url, _server) = serve_once("404 Not Found", b"missing").await;

        assert_eq!(loader.load(&url).await, Err(LoadFailure::Status(404)));
        assert!(timeline.entries().is_empty());
    }

    #[tokio::test]
    async fn tag_collapses_status_into_generic_failure() {
        let timeline = ResourceTimeline::shared();
        let loader = TagLoader::new(probe_client().unwrap(), timeline.clone());
        let (url, _server) = serve_once("500 Internal Server Error", b"oops").await;

        assert_eq!(loader.load(&url).await, Err(LoadFailure::Generic));
        assert!(timeline.entries().is_empty());
    }

    #[tokio::test]
    async fn tag_load_reports_timing_without_cache_directives() {
        let timeline = ResourceTimeline::shared();
        let loader = loader_for(LoadStrategy::Tag, probe_client().unwrap(), timeline.clone());
        assert_eq!(loader.strategy(), LoadStrategy::Tag);
        let (url, server) = serve_once("200 OK", b"jpegish").await;

        loader.load(&url).await.expect("tag settles");

        let request = server.await.unwrap().to_ascii_lowercase();
        assert!(!request.contains("cache-control"));
        assert_eq!(timeline.entries()[0].transfer_size, 7);
    }

    #[tokio::test]
    async fn transport_errors_per_strategy() {
        let timeline = ResourceTimeline::shared();
        let client = probe_client().unwrap();
        let url = closed_port_url().await;

        let tag = TagLoader::new(client.clone(), timeline.clone());
        assert_eq!(tag.load(&url).await, Err(LoadFailure::Generic));

        let fetch = FetchLoader::new(client, timeline);
        assert!(matches!(fetch.load(&url).await, Err(LoadFailure::Transport(_))));
    }
}
