//! Signal database and DBC parser
//!
//! This module contains the DBC file loader and the unified, ordered
//! signal database the frame matcher scans.

pub mod database;
pub mod dbc;

// Re-export key types for convenience
pub use database::{
    ByteOrder, DatabaseStats, MatchMode, MessageDefinition, MultiplexerInfo, SignalDatabase,
    SignalDefinition, ValueType,
};
