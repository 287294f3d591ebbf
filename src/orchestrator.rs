//! Orchestrator - resolves the catalog, launches one worker per channel,
//! forwards operator commands into the trigger slot and tears everything down.

use crossbeam::channel::{bounded, Sender};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::async_impl::channel_task;
use crate::config::{CatalogEntry, Runtime, Settings, SystemConfig, TypeTable};
use crate::control::{Command, TriggerSource};
use crate::error::{SensorError, SensorResult};
use crate::ipc::{ChannelContext, PublishSink, TriggerCoordinator};
use crate::metrics::{ChannelStats, MetricsReport, TimingMetrics};
use crate::sensor::{resolve, Channel, ChannelId, EmitMode};
use crate::threaded_impl::spawn_channel_thread;

// ============================================================================
// CATALOG RESOLUTION
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct RejectedEntry {
    /// Catalog position; also the id the entry would have had.
    pub index: usize,
    pub name: String,
    pub error: SensorError,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedCatalog {
    pub channels: Vec<Channel>,
    pub rejected: Vec<RejectedEntry>,
}

/// Resolve every catalog entry in declaration order.
///
/// Ids are catalog positions, so a rejected entry still uses up its id and
/// later channels keep the codes an operator would count to. Rejections are
/// logged and collected; they never abort the rest of the catalog.
pub fn resolve_catalog(entries: &[CatalogEntry], types: &TypeTable) -> ResolvedCatalog {
    let mut resolved = ResolvedCatalog::default();
    let mut names = HashSet::new();

    for (index, entry) in entries.iter().enumerate() {
        let result = resolve(&entry.name, &entry.spec, types).and_then(|params| {
            if names.insert(entry.name.clone()) {
                Ok(params)
            } else {
                Err(SensorError::InvalidSpec {
                    name: entry.name.clone(),
                    what: "duplicate sensor name".to_string(),
                })
            }
        });

        match result {
            Ok(params) => resolved.channels.push(Channel::new(index as ChannelId, entry.name.clone(), params)),
            Err(e) => {
                error!(channel = %entry.name, error = %e, "couldn't initialize the sensor");
                resolved.rejected.push(RejectedEntry { index, name: entry.name.clone(), error: e });
            }
        }
    }
    resolved
}

// ============================================================================
// FLEET - The running channel workers
// ============================================================================

struct Worker {
    channel: Channel,
    stats: Arc<ChannelStats>,
}

enum Backend {
    Threads {
        stop: Sender<()>,
        handles: Vec<thread::JoinHandle<()>>,
    },
    Tokio {
        runtime: tokio::runtime::Runtime,
        stop: watch::Sender<bool>,
        handles: Vec<tokio::task::JoinHandle<()>>,
    },
}

/// Launched channels, owned by the orchestrator until shutdown.
pub struct Fleet {
    workers: Vec<Worker>,
    backend: Backend,
}

impl Fleet {
    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.workers.iter().map(|w| &w.channel)
    }

    pub fn stats(&self, id: ChannelId) -> Option<Arc<ChannelStats>> {
        self.workers.iter().find(|w| w.channel.id == id).map(|w| w.stats.clone())
    }

    /// Whether some triggered channel answers to `code`.
    pub fn is_trigger_code(&self, code: i64) -> bool {
        self.workers
            .iter()
            .any(|w| w.channel.trigger_code() == code && w.channel.params.mode() == EmitMode::Triggered)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

// ============================================================================
// REPORTS
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlSummary {
    pub forwarded: u64,
    pub malformed: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSummary {
    pub id: ChannelId,
    pub name: String,
    pub published: u64,
    pub failed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShutdownReport {
    pub channels: Vec<ChannelSummary>,
    pub metrics: MetricsReport,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub rejected: Vec<RejectedEntry>,
    pub control: ControlSummary,
    pub shutdown: ShutdownReport,
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

pub struct Orchestrator {
    settings: Settings,
    base_topic: String,
    coordinator: Arc<TriggerCoordinator>,
    sink: Arc<dyn PublishSink>,
    metrics: TimingMetrics,
}

impl Orchestrator {
    pub fn new(settings: Settings, base_topic: impl Into<String>, sink: Arc<dyn PublishSink>) -> Self {
        Self {
            settings,
            base_topic: base_topic.into(),
            coordinator: Arc::new(TriggerCoordinator::new()),
            sink,
            metrics: TimingMetrics::new(),
        }
    }

    pub fn from_config(config: &SystemConfig, sink: Arc<dyn PublishSink>) -> Self {
        Self::new(config.settings.clone(), config.sink.base_topic.clone(), sink)
    }

    pub fn coordinator(&self) -> Arc<TriggerCoordinator> {
        self.coordinator.clone()
    }

    pub fn metrics(&self) -> &TimingMetrics {
        &self.metrics
    }

    fn context(&self) -> ChannelContext {
        ChannelContext {
            coordinator: self.coordinator.clone(),
            sink: self.sink.clone(),
            metrics: self.metrics.clone(),
            base_topic: self.base_topic.clone(),
            trigger_poll: self.settings.trigger_poll(),
        }
    }

    /// Start one worker per channel on the configured runtime.
    ///
    /// A channel whose worker cannot be started is logged and left out; only
    /// failing to build the tokio runtime itself is an error.
    pub fn launch(&self, channels: Vec<Channel>) -> SensorResult<Fleet> {
        let stagger = self.settings.launch_stagger();
        let mut workers = Vec::with_capacity(channels.len());

        let backend = match self.settings.runtime {
            Runtime::Threads => {
                let (stop, stop_rx) = bounded::<()>(0);
                let mut handles = Vec::with_capacity(channels.len());
                for channel in channels {
                    match spawn_channel_thread(channel.clone(), self.context(), stop_rx.clone()) {
                        Ok((handle, stats)) => {
                            handles.push(handle);
                            workers.push(Worker { channel, stats });
                        }
                        Err(e) => error!(channel = %channel.name, error = %e, "couldn't start the sensor"),
                    }
                    pause(stagger);
                }
                Backend::Threads { stop, handles }
            }
            Runtime::Tokio => {
                let runtime = tokio::runtime::Builder::new_multi_thread()
                    .enable_time()
                    .thread_name("sensor-worker")
                    .build()
                    .map_err(|e| SensorError::Spawn { name: "tokio runtime".to_string(), message: e.to_string() })?;
                let (stop, stop_rx) = watch::channel(false);
                let mut handles = Vec::with_capacity(channels.len());
                for channel in channels {
                    let stats = ChannelStats::new();
                    handles.push(runtime.spawn(channel_task(channel.clone(), self.context(), stop_rx.clone(), stats.clone())));
                    workers.push(Worker { channel, stats });
                    pause(stagger);
                }
                Backend::Tokio { runtime, stop, handles }
            }
        };

        info!(channels = workers.len(), runtime = ?self.settings.runtime, "sensors launched");
        Ok(Fleet { workers, backend })
    }

    /// Forward operator commands into the trigger slot until the exit command.
    pub fn control_loop(&self, fleet: &Fleet, source: &mut dyn TriggerSource) -> ControlSummary {
        let mut summary = ControlSummary::default();
        loop {
            match source.read_command() {
                Ok(Command::Exit) => break,
                Ok(Command::Trigger(code)) => {
                    if !fleet.is_trigger_code(code) {
                        warn!(code, "no triggered sensor has this code");
                    }
                    self.coordinator.set_pending(code);
                    self.metrics.record_trigger_issued();
                    summary.forwarded += 1;
                }
                Err(e) => {
                    warn!(error = %e, "ignoring command");
                    summary.malformed += 1;
                }
            }
        }
        summary
    }

    /// Stop every worker, wait for them, then disconnect the sink.
    pub fn shutdown(&self, fleet: Fleet) -> ShutdownReport {
        let Fleet { workers, backend } = fleet;

        match backend {
            Backend::Threads { stop, handles } => {
                drop(stop);
                self.coordinator.wake_all();
                for handle in handles {
                    if handle.join().is_err() {
                        error!("sensor thread panicked");
                    }
                }
            }
            Backend::Tokio { runtime, stop, handles } => {
                let _ = stop.send(true);
                runtime.block_on(async {
                    for handle in handles {
                        if let Err(e) = handle.await {
                            error!(error = %e, "sensor task failed");
                        }
                    }
                });
                runtime.shutdown_timeout(Duration::from_secs(1));
            }
        }

        self.sink.disconnect();
        info!("disconnected from the sink");

        let channels = workers
            .iter()
            .map(|w| ChannelSummary {
                id: w.channel.id,
                name: w.channel.name.clone(),
                published: w.stats.published(),
                failed: w.stats.has_failed(),
            })
            .collect();

        let metrics = self.metrics.report();
        info!(
            published = metrics.published,
            triggers_issued = metrics.triggers_issued,
            triggers_consumed = metrics.triggers_consumed,
            generation_p50 = ?metrics.generation_p50,
            generation_p99 = ?metrics.generation_p99,
            trigger_latency_p50 = ?metrics.trigger_latency_p50,
            trigger_latency_p99 = ?metrics.trigger_latency_p99,
            "run finished"
        );

        ShutdownReport { channels, metrics }
    }

    /// Resolve, launch, drive until exit, shut down.
    pub fn run(
        &self,
        catalog: &[CatalogEntry],
        types: &TypeTable,
        source: &mut dyn TriggerSource,
    ) -> SensorResult<RunReport> {
        let resolved = resolve_catalog(catalog, types);
        let fleet = self.launch(resolved.channels)?;
        let control = self.control_loop(&fleet, source);
        let shutdown = self.shutdown(fleet);
        Ok(RunReport { rejected: resolved.rejected, control, shutdown })
    }
}

fn pause(stagger: Duration) {
    if !stagger.is_zero() {
        thread::sleep(stagger);
    }
}
