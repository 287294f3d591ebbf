//! Runtime configuration: sink target, engine settings, sensor type table and channel catalog.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{SensorError, SensorResult};

/// Sensor type name -> `[low, high, interval, fraction, decimal]`.
pub type TypeTable = BTreeMap<String, Vec<f64>>;

/// What a catalog entry says about its parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ChannelSpec {
    /// Look the parameters up in the type table.
    Type(String),
    /// Explicit parameter tuple.
    Params(Vec<f64>),
    /// Anything else; rejected when the entry is resolved.
    Unrecognized(toml::Value),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    pub spec: ChannelSpec,
}

impl CatalogEntry {
    pub fn typed(name: &str, type_name: &str) -> Self {
        Self { name: name.to_string(), spec: ChannelSpec::Type(type_name.to_string()) }
    }

    pub fn explicit(name: &str, params: [f64; 5]) -> Self {
        Self { name: name.to_string(), spec: ChannelSpec::Params(params.to_vec()) }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Prefix of every channel subtopic.
    pub base_topic: String,
    /// `"stdout"` or a file path to append publications to.
    pub output: String,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            base_topic: "/group05a".to_string(),
            output: "stdout".to_string(),
        }
    }
}

/// Concurrency model used to run the channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Runtime {
    /// One OS thread per channel.
    Threads,
    /// One tokio task per channel on a multi-threaded runtime.
    Tokio,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub runtime: Runtime,
    /// Upper bound on how long a triggered channel waits between checks of the trigger slot.
    pub trigger_poll_ms: u64,
    /// Pause between channel launches.
    pub launch_stagger_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            runtime: Runtime::Threads,
            trigger_poll_ms: 100,
            launch_stagger_ms: 200,
        }
    }
}

impl Settings {
    pub fn trigger_poll(&self) -> Duration {
        Duration::from_millis(self.trigger_poll_ms.max(1))
    }

    pub fn launch_stagger(&self) -> Duration {
        Duration::from_millis(self.launch_stagger_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub sink: SinkConfig,
    pub settings: Settings,
    pub types: TypeTable,
    pub channels: Vec<CatalogEntry>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            sink: SinkConfig::default(),
            settings: Settings::default(),
            types: default_types(),
            channels: default_catalog(),
        }
    }
}

/// Built-in sensor types.
pub fn default_types() -> TypeTable {
    [
        ("co2", [400.0, 1000.0, 30.0, 0.7, 0.0]),
        ("smoke", [1.0, 1.0, 0.0, 1.0, 0.0]),
        ("pressure", [90.0, 120.0, 30.0, 0.9, 2.0]),
        ("occupancy", [1.0, 1.0, 0.0, 1.0, 0.0]),
        ("counting", [0.0, 1000.0, 3600.0, 1.0, 0.0]),
        ("level", [0.0, 20.0, 60.0, 0.9, 1.0]),
        ("capacity", [0.0, 3000.0, 3600.0, 0.6, 1.0]),
    ]
    .into_iter()
    .map(|(name, params)| (name.to_string(), params.to_vec()))
    .collect()
}

/// Built-in channel catalog.
pub fn default_catalog() -> Vec<CatalogEntry> {
    vec![
        CatalogEntry::typed("co201", "co2"),
        CatalogEntry::typed("smo01", "smoke"),
        CatalogEntry::typed("pres01", "pressure"),
        CatalogEntry::typed("occ01", "occupancy"),
        CatalogEntry::typed("cou01", "counting"),
        CatalogEntry::typed("lev01", "level"),
        CatalogEntry::typed("cap01", "capacity"),
        CatalogEntry::explicit("co202", [700.0, 2000.0, 30.0, 0.7, 0.0]),
        CatalogEntry::typed("pres02", "pressure"),
        CatalogEntry::explicit("lev02", [0.0, 10.0, 60.0, 0.9, 1.0]),
    ]
}

pub fn parse_config(source: &str) -> SensorResult<SystemConfig> {
    toml::from_str::<SystemConfig>(source).map_err(|e| SensorError::Config { message: e.to_string() })
}

/// Load a config file. A missing file falls back to the built-in configuration;
/// an unreadable or unparseable one is an error.
pub fn load_config(path: &Path) -> SensorResult<SystemConfig> {
    if !path.exists() {
        warn!(path = %path.display(), "config file not found, using built-in sensors");
        return Ok(SystemConfig::default());
    }
    let source = std::fs::read_to_string(path).map_err(|e| SensorError::Config {
        message: format!("{}: {}", path.display(), e),
    })?;
    let config = parse_config(&source)?;
    info!(path = %path.display(), channels = config.channels.len(), types = config.types.len(), "loaded config");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_types_and_mixed_catalog() {
        let config = parse_config(
            r#"
            [sink]
            base_topic = "/lab"

            [settings]
            runtime = "tokio"
            trigger_poll_ms = 20

            [types]
            co2 = [400, 1000, 30, 0.7, 0]

            [[channels]]
            name = "a"
            spec = "co2"

            [[channels]]
            name = "b"
            spec = [0, 10, 0, 0.9, 1]

            [[channels]]
            name = "c"
            spec = 42
            "#,
        )
        .unwrap();

        assert_eq!(config.sink.base_topic, "/lab");
        assert_eq!(config.sink.output, "stdout");
        assert_eq!(config.settings.runtime, Runtime::Tokio);
        assert_eq!(config.settings.trigger_poll(), Duration::from_millis(20));
        assert_eq!(config.settings.launch_stagger_ms, 200);
        assert_eq!(config.types["co2"], vec![400.0, 1000.0, 30.0, 0.7, 0.0]);
        assert_eq!(config.channels[0].spec, ChannelSpec::Type("co2".into()));
        assert_eq!(config.channels[1].spec, ChannelSpec::Params(vec![0.0, 10.0, 0.0, 0.9, 1.0]));
        assert!(matches!(config.channels[2].spec, ChannelSpec::Unrecognized(_)));
    }

    #[test]
    fn empty_file_is_builtin_config() {
        assert_eq!(parse_config("").unwrap(), SystemConfig::default());
    }

    #[test]
    fn shipped_config_matches_builtin() {
        let shipped = parse_config(include_str!("../config/sensors.toml")).unwrap();
        assert_eq!(shipped, SystemConfig::default());
    }

    #[test]
    fn syntax_error_is_config_error() {
        assert!(matches!(parse_config("[sink"), Err(SensorError::Config { .. })));
    }

    #[test]
    fn missing_file_falls_back_to_default() {
        let config = load_config(Path::new("definitely/not/here.toml")).unwrap();
        assert_eq!(config.channels.len(), 10);
    }
}
