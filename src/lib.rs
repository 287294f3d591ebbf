pub mod async_impl;
pub mod config;
pub mod control;
pub mod error;
pub mod ipc;
pub mod metrics;
pub mod orchestrator;
pub mod sensor;
pub mod threaded_impl;

pub use config::{load_config, CatalogEntry, ChannelSpec, Runtime, Settings, SystemConfig, TypeTable};
pub use control::{Command, LineTriggerSource, ScriptedTriggerSource, TriggerSource, EXIT_CODE};
pub use error::{ParameterViolation, SensorError, SensorResult};
pub use ipc::{ChannelSink, Publication, PublishSink, TriggerCoordinator, WriterSink, NO_TRIGGER};
pub use metrics::{ChannelStats, MetricsReport, TimingMetrics};
pub use orchestrator::{resolve_catalog, Orchestrator, RunReport};
pub use sensor::{Channel, ChannelId, EmitMode, ParameterSet, SignalGenerator};
