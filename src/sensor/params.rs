use std::time::Duration;

use crate::config::{ChannelSpec, TypeTable};
use crate::error::{ParameterViolation, SensorError, SensorResult};

/// Largest rounding precision accepted from a parameter tuple. Beyond this
/// `10^places` stops being exact in an f64.
pub const MAX_DECIMAL_PLACES: u32 = 15;

/// Generation parameters of one channel: `[low, high, interval, fraction, decimal]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterSet {
    pub low: f64,
    pub high: f64,
    /// Seconds between publishes; `0` means the channel waits for its trigger code.
    pub interval_secs: f64,
    /// Weight given to the previous value.
    pub fraction: f64,
    /// `0` rounds to a whole number.
    pub decimal_places: u32,
}

/// How a channel delivers its values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitMode {
    Periodic(Duration),
    Triggered,
}

impl ParameterSet {
    pub fn new(low: f64, high: f64, interval_secs: f64, fraction: f64, decimal_places: u32) -> Self {
        Self { low, high, interval_secs, fraction, decimal_places }
    }

    /// Build a parameter set from a 5-element tuple as written in the catalog.
    ///
    /// Only the shape is checked here; the invariants are left to [`validate`](Self::validate).
    pub fn from_tuple(name: &str, tuple: &[f64]) -> SensorResult<Self> {
        let [low, high, interval_secs, fraction, decimal] = tuple else {
            return Err(SensorError::InvalidSpec {
                name: name.to_string(),
                what: format!("expected [low, high, interval, fraction, decimal], got {} values", tuple.len()),
            });
        };

        let decimal = *decimal;
        if !decimal.is_finite() || decimal < 0.0 || decimal.fract() != 0.0 || decimal > MAX_DECIMAL_PLACES as f64 {
            return Err(SensorError::InvalidSpec {
                name: name.to_string(),
                what: format!("decimal places must be an integer in 0..={}, got {}", MAX_DECIMAL_PLACES, decimal),
            });
        }

        Ok(Self::new(*low, *high, *interval_secs, *fraction, decimal as u32))
    }

    /// Check the channel invariants: finite inputs, `low <= high`,
    /// `interval >= 0`, `fraction <= 1`. Intervals must fit a `Duration` and
    /// `high - low` must not overflow.
    pub fn validate(&self) -> SensorResult<()> {
        for (what, value) in [
            ("low", self.low),
            ("high", self.high),
            ("interval", self.interval_secs),
            ("fraction", self.fraction),
        ] {
            if !value.is_finite() {
                return Err(ParameterViolation::NonFinite { what }.into());
            }
        }
        if self.low > self.high {
            return Err(ParameterViolation::LowAboveHigh { low: self.low, high: self.high }.into());
        }
        if self.interval_secs < 0.0 {
            return Err(ParameterViolation::NegativeInterval { interval_secs: self.interval_secs }.into());
        }
        if Duration::try_from_secs_f64(self.interval_secs).is_err() {
            return Err(ParameterViolation::IntervalTooLong { interval_secs: self.interval_secs }.into());
        }
        if !(self.high - self.low).is_finite() {
            return Err(ParameterViolation::RangeTooWide { low: self.low, high: self.high }.into());
        }
        if self.fraction > 1.0 {
            return Err(ParameterViolation::FractionAboveOne { fraction: self.fraction }.into());
        }
        Ok(())
    }

    /// Starting value of every channel. Equals `low` exactly when `low == high`.
    pub fn midpoint(&self) -> f64 {
        self.low + (self.high - self.low) / 2.0
    }

    /// `low == high` channels never draw; they always blend towards `low`.
    pub fn is_constant(&self) -> bool {
        self.low == self.high
    }

    /// Emission mode. An interval too long for a `Duration` (only possible on
    /// an unvalidated set) saturates to `Duration::MAX`.
    pub fn mode(&self) -> EmitMode {
        if self.interval_secs > 0.0 {
            EmitMode::Periodic(Duration::try_from_secs_f64(self.interval_secs).unwrap_or(Duration::MAX))
        } else {
            EmitMode::Triggered
        }
    }
}

/// Resolve a catalog entry into a validated parameter set.
///
/// Type names go through the type table; explicit tuples are used as-is.
pub fn resolve(name: &str, spec: &ChannelSpec, types: &TypeTable) -> SensorResult<ParameterSet> {
    if name.trim().is_empty() {
        return Err(SensorError::InvalidSpec {
            name: name.to_string(),
            what: "sensor name cannot be empty".to_string(),
        });
    }

    let params = match spec {
        ChannelSpec::Type(type_name) => {
            let tuple = types.get(type_name).ok_or_else(|| SensorError::UnknownType {
                name: name.to_string(),
                type_name: type_name.clone(),
            })?;
            ParameterSet::from_tuple(name, tuple)?
        }
        ChannelSpec::Params(tuple) => ParameterSet::from_tuple(name, tuple)?,
        ChannelSpec::Unrecognized(value) => {
            return Err(SensorError::InvalidSpec {
                name: name.to_string(),
                what: format!("expected a sensor type name or a parameter list, got {}", value),
            });
        }
    };

    params.validate()?;
    Ok(params)
}
