//! Core types for the CAN bus monitor library
//!
//! This module defines the fundamental types that flow through the live
//! pipeline: raw frames as received from a bus channel, decoded signal
//! values, and the library error type. Frames are immutable once stamped
//! by the ingestion layer.

use std::fmt;

/// Result type for monitor operations
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Raw CAN frame as received from a bus channel
///
/// This represents a single CAN frame after the ingestion layer has
/// stamped it with its channel index and a monotonic timestamp, before
/// any signal decoding or message interpretation.
#[derive(Debug, Clone, PartialEq)]
pub struct CanFrame {
    /// CAN message ID (11-bit or 29-bit)
    pub can_id: u32,
    /// Channel index the frame arrived on (0-based)
    pub channel: u8,
    /// Seconds since the pipeline's start epoch (monotonic)
    pub timestamp: f64,
    /// Frame data bytes (0-8 bytes for classic CAN)
    pub data: Vec<u8>,
    /// True if the bus reported this as an error frame
    pub is_error_frame: bool,
}

impl CanFrame {
    /// Get the data length code (DLC) - number of data bytes
    pub fn dlc(&self) -> usize {
        self.data.len()
    }
}

/// Errors that can occur while monitoring
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("Failed to parse DBC file: {0}")]
    DbcParseError(String),

    #[error("Failed to open bus channel: {0}")]
    BusError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A decoded message with all the signals extracted from one frame
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage {
    /// Message name from the signal database
    pub message_name: String,
    /// All signals decoded from the frame's payload
    pub signals: Vec<DecodedSignal>,
}

/// A decoded signal with its current value
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSignal {
    /// Signal name from the signal database
    pub name: String,
    /// Physical value after scaling/offset
    pub value: SignalValue,
    /// Engineering unit (e.g., "km/h", "°C", "V")
    pub unit: Option<String>,
    /// Raw value before scaling (useful for debugging)
    pub raw_value: i64,
}

/// Signal value types produced by the decoder
#[derive(Debug, Clone, PartialEq)]
pub enum SignalValue {
    /// Signed integer value
    Integer(i64),
    /// Floating-point value (after scaling/offset)
    Float(f64),
    /// Boolean value (single unscaled bit)
    Boolean(bool),
}

impl fmt::Display for SignalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalValue::Integer(v) => write!(f, "{}", v),
            SignalValue::Float(v) => write!(f, "{:.3}", v),
            SignalValue::Boolean(v) => write!(f, "{}", if *v { "true" } else { "false" }),
        }
    }
}

impl SignalValue {
    /// Convert signal value to f64
    pub fn as_f64(&self) -> f64 {
        match self {
            SignalValue::Integer(v) => *v as f64,
            SignalValue::Float(v) => *v,
            SignalValue::Boolean(v) => {
                if *v {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Numeric view used for range evaluation; booleans are status
    /// flags and are never range-checked
    pub fn numeric(&self) -> Option<f64> {
        match self {
            SignalValue::Integer(v) => Some(*v as f64),
            SignalValue::Float(v) => Some(*v),
            SignalValue::Boolean(_) => None,
        }
    }
}
