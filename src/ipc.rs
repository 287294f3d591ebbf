//! IPC module - the shared trigger slot, the publish sink and the bundle
//! of shared resources handed to every channel worker

pub mod sink;
pub mod trigger;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::metrics::{ChannelStats, TimingMetrics};
use crate::sensor::{Channel, EmitMode};

pub use sink::{ChannelSink, Publication, PublishSink, WriterSink};
pub use trigger::{TriggerCoordinator, NO_TRIGGER};

// ============================================================================
// CHANNEL CONTEXT - Shared resources injected into each channel worker
// ============================================================================

#[derive(Clone)]
pub struct ChannelContext {
    pub coordinator: Arc<TriggerCoordinator>,
    pub sink: Arc<dyn PublishSink>,
    pub metrics: TimingMetrics,
    pub base_topic: String,
    pub trigger_poll: Duration,
}

impl ChannelContext {
    pub fn announce(&self, channel: &Channel) {
        match channel.params.mode() {
            EmitMode::Periodic(interval) => {
                info!(channel = %channel.name, id = channel.id, ?interval, "initialized the sensor");
            }
            EmitMode::Triggered => {
                info!(
                    channel = %channel.name,
                    id = channel.id,
                    "initialized the sensor -> enter {} to trigger the sensor {}",
                    channel.trigger_code(),
                    channel.name
                );
            }
        }
    }

    pub fn publish(&self, subtopic: &str, value: f64, stats: &ChannelStats) {
        self.sink.publish(subtopic, value);
        self.metrics.record_publish();
        stats.published.fetch_add(1, Ordering::Relaxed);
        debug!(subtopic, value, "published");
    }
}
