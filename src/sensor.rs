//! Sensor module - channel parameters, resolution and correlated value generation

pub mod generator;
pub mod params;

pub use generator::{correlated_step, round_to, SignalGenerator};
pub use params::{resolve, EmitMode, ParameterSet};

/// Sequential channel id. Doubles as the trigger code of triggered channels.
pub type ChannelId = u32;

// ============================================================================
// CHANNEL - One virtual sensor
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
    pub params: ParameterSet,
}

impl Channel {
    pub fn new(id: ChannelId, name: impl Into<String>, params: ParameterSet) -> Self {
        Self { id, name: name.into(), params }
    }

    /// `<base_topic>/<name>`
    pub fn subtopic(&self, base_topic: &str) -> String {
        format!("{}/{}", base_topic, self.name)
    }

    /// Operator code that releases this channel's pending value.
    pub fn trigger_code(&self) -> i64 {
        self.id as i64
    }
}
