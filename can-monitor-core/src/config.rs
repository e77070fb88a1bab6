//! Watch-list configuration types
//!
//! This module defines the per-signal configuration consumed by the state
//! aggregator. The library is intentionally simple - file formats, channel
//! enumeration and argument handling are the application layer's job.

use serde::{Deserialize, Serialize};

use crate::types::SignalValue;

/// A watched signal: which decoded signal to track and the limits applied
/// to its value
///
/// The `message` constraint disambiguates identically-named signals that
/// appear in more than one message; an empty string accepts the signal
/// from any message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalWatch {
    /// Signal name as defined in the signal database
    pub name: String,

    /// Expected message name; empty means "any message"
    #[serde(default)]
    pub message: String,

    /// Lower limit for the range flag (absent = unbounded)
    #[serde(default)]
    pub min: Option<f64>,

    /// Upper limit for the range flag (absent = unbounded)
    #[serde(default)]
    pub max: Option<f64>,
}

impl SignalWatch {
    /// Create an unconstrained watch for a signal name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: String::new(),
            min: None,
            max: None,
        }
    }

    /// Builder method: require the signal to come from a specific message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Builder method: set both range limits
    pub fn with_limits(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    /// Effective limits; unspecified bounds are infinite
    pub fn limits(&self) -> (f64, f64) {
        (
            self.min.unwrap_or(f64::NEG_INFINITY),
            self.max.unwrap_or(f64::INFINITY),
        )
    }

    /// Check whether a decode from `message_name` should update this watch
    pub fn accepts_message(&self, message_name: &str) -> bool {
        self.message.is_empty() || self.message == message_name
    }

    /// Range evaluation: out of range iff the value lies strictly outside
    /// the configured limits. Boundary values are in range; non-numeric
    /// values are never flagged.
    pub fn is_out_of_range(&self, value: &SignalValue) -> bool {
        match value.numeric() {
            Some(v) => {
                let (min, max) = self.limits();
                v < min || v > max
            }
            None => false,
        }
    }
}
