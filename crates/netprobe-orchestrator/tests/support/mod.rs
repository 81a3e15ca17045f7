//! Scripted loader that plays the host: it reports timing entries to a real
//! timeline on a schedule and then settles, fails or hangs.

#![allow(dead_code)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use netprobe_loader::{LoadFailure, ResourceLoader};
use netprobe_telemetry::ResourceTimeline;
use netprobe_types::{config::LoadStrategy, timing::TimingRecord};
use tokio::time::sleep;

#[derive(Debug, Clone)]
pub enum EntryName {
    /// The literal cache-busted URL the loader was given.
    Requested,
    Literal(String),
}

#[derive(Debug, Clone)]
pub struct Entry {
    pub name: EntryName,
    pub transfer_size: u64,
    pub response_start: f64,
    pub response_end: f64,
}

impl Entry {
    pub fn usable(transfer_size: u64, response_start: f64, response_end: f64) -> Self {
        Self {
            name: EntryName::Requested,
            transfer_size,
            response_start,
            response_end,
        }
    }

    pub fn opaque() -> Self {
        Self::usable(0, 10.0, 20.0)
    }

    pub fn named(name: impl Into<String>, transfer_size: u64) -> Self {
        Self {
            name: EntryName::Literal(name.into()),
            transfer_size,
            response_start: 0.0,
            response_end: 100.0,
        }
    }
}

/// Entries reported `after` the previous step finished.
#[derive(Debug, Clone)]
pub struct ScriptedFlush {
    pub after: Duration,
    pub entries: Vec<Entry>,
}

#[derive(Debug, Clone)]
pub enum Finish {
    Settle,
    Fail(LoadFailure),
    Hang,
}

#[derive(Debug, Clone)]
pub struct Script {
    pub flushes: Vec<ScriptedFlush>,
    pub finish_after: Duration,
    pub finish: Finish,
}

impl Script {
    /// One usable entry at 10ms, then settle.
    pub fn serve(transfer_size: u64, response_start: f64, response_end: f64) -> Self {
        Self {
            flushes: vec![ScriptedFlush {
                after: Duration::from_millis(10),
                entries: vec![Entry::usable(transfer_size, response_start, response_end)],
            }],
            finish_after: Duration::ZERO,
            finish: Finish::Settle,
        }
    }

    pub fn fail(failure: LoadFailure) -> Self {
        Self {
            flushes: Vec::new(),
            finish_after: Duration::from_millis(5),
            finish: Finish::Fail(failure),
        }
    }

    pub fn hang() -> Self {
        Self {
            flushes: Vec::new(),
            finish_after: Duration::ZERO,
            finish: Finish::Hang,
        }
    }

    pub fn then_flush(mut self, after: Duration, entries: Vec<Entry>) -> Self {
        self.flushes.push(ScriptedFlush { after, entries });
        self
    }

    pub fn finishing(mut self, after: Duration, finish: Finish) -> Self {
        self.finish_after = after;
        self.finish = finish;
        self
    }
}

pub struct ScriptedLoader {
    strategy: LoadStrategy,
    timeline: Arc<ResourceTimeline>,
    scripts: Vec<(String, Script)>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedLoader {
    pub fn new(timeline: Arc<ResourceTimeline>) -> Self {
        Self {
            strategy: LoadStrategy::Tag,
            timeline,
            scripts: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_strategy(mut self, strategy: LoadStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Script loads whose URL starts with `url`.
    pub fn on(mut self, url: impl Into<String>, script: Script) -> Self {
        self.scripts.push((url.into(), script));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn was_called_for(&self, url: &str) -> bool {
        self.calls().iter().any(|call| call.starts_with(url))
    }
}

#[async_trait]
impl ResourceLoader for ScriptedLoader {
    fn strategy(&self) -> LoadStrategy {
        self.strategy
    }

    async fn load(&self, url: &str) -> Result<(), LoadFailure> {
        self.calls.lock().unwrap().push(url.to_string());
        let script = self
            .scripts
            .iter()
            .find(|(prefix, _)| url.starts_with(prefix.as_str()))
            .map(|(_, script)| script.clone())
            .unwrap_or_else(|| Script::fail(LoadFailure::Generic));

        for flush in script.flushes {
            sleep(flush.after).await;
            let entries = flush
                .entries
                .into_iter()
                .map(|entry| {
                    let name = match entry.name {
                        EntryName::Requested => url.to_string(),
                        EntryName::Literal(name) => name,
                    };
                    TimingRecord::new(name, entry.transfer_size, entry.response_start, entry.response_end)
                })
                .collect();
            self.timeline.record_batch(entries).unwrap();
        }

        sleep(script.finish_after).await;
        match script.finish {
            Finish::Settle => Ok(()),
            Finish::Fail(failure) => Err(failure),
            Finish::Hang => std::future::pending().await,
        }
    }
}
