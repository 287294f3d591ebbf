//! Error types for channel resolution, generation and operator control.

use std::fmt;
use thiserror::Error;

/// Result type used throughout the sensor environment.
pub type SensorResult<T> = Result<T, SensorError>;

/// Which parameter invariant a channel violated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParameterViolation {
    LowAboveHigh { low: f64, high: f64 },
    NegativeInterval { interval_secs: f64 },
    FractionAboveOne { fraction: f64 },
    NonFinite { what: &'static str },
    IntervalTooLong { interval_secs: f64 },
    RangeTooWide { low: f64, high: f64 },
}

impl fmt::Display for ParameterViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterViolation::LowAboveHigh { low, high } => {
                write!(f, "low>high (upper limit {} is lower than lower limit {})", high, low)
            }
            ParameterViolation::NegativeInterval { interval_secs } => {
                write!(f, "interval<0 (interval {} s cannot be negative)", interval_secs)
            }
            ParameterViolation::FractionAboveOne { fraction } => {
                write!(f, "fraction>1 (fraction {} cannot be greater than 1)", fraction)
            }
            ParameterViolation::NonFinite { what } => write!(f, "non-finite {}", what),
            ParameterViolation::IntervalTooLong { interval_secs } => {
                write!(f, "interval too long ({} s does not fit a duration)", interval_secs)
            }
            ParameterViolation::RangeTooWide { low, high } => {
                write!(f, "range too wide (high - low overflows for [{}, {}])", low, high)
            }
        }
    }
}

/// Everything that can go wrong between the catalog and the sink.
///
/// Only `SinkConnect` and `Config` are fatal; the rest are recovered at the
/// scope of the single channel or command that produced them.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SensorError {
    #[error("Invalid spec for sensor '{name}': {what}")]
    InvalidSpec { name: String, what: String },

    #[error("Sensor type '{type_name}' is not available (sensor '{name}')")]
    UnknownType { name: String, type_name: String },

    #[error("Invalid parameter: {violation}")]
    InvalidParameter { violation: ParameterViolation },

    #[error("Malformed command: '{input}' is not an integer")]
    MalformedCommand { input: String },

    #[error("Couldn't start sensor '{name}': {message}")]
    Spawn { name: String, message: String },

    #[error("Sink connection failed: {message}")]
    SinkConnect { message: String },

    #[error("Config error: {message}")]
    Config { message: String },
}

impl From<ParameterViolation> for SensorError {
    fn from(violation: ParameterViolation) -> Self {
        SensorError::InvalidParameter { violation }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn violation_message_names_invariant() {
        let err: SensorError = ParameterViolation::LowAboveHigh { low: 10.0, high: 5.0 }.into();
        assert!(err.to_string().contains("low>high"));

        let err: SensorError = ParameterViolation::FractionAboveOne { fraction: 1.5 }.into();
        assert!(err.to_string().contains("fraction>1"));
    }
}
