//! CAN Bus Monitor Library
//!
//! A library for live monitoring of CAN bus traffic: frames are ingested
//! from one or more channels, matched against DBC signal definitions,
//! decoded into named signal values, aggregated into a shared state table
//! and appended to a Vector ASC compatible trace file.
//!
//! # Architecture
//!
//! The library is organized around a single pipeline:
//! - One reader thread per frame source (SocketCAN or trace replay)
//! - A bounded channel into a single pipeline thread
//! - The pipeline traces every valid frame, matches it against the signal
//!   database and folds decoded signals into the shared state
//! - A liveness worker derives a receiving/stalled status from the frame
//!   counter
//!
//! The library does NOT:
//! - Render anything (the application layer polls state snapshots)
//! - Parse configuration files or arguments
//! - Write to the bus
//!
//! # Example Usage
//!
//! ```no_run
//! use can_monitor_core::config::SignalWatch;
//! use can_monitor_core::ingest::IngestionManager;
//! use can_monitor_core::signals::{dbc, SignalDatabase};
//! use can_monitor_core::sources::AscReplaySource;
//! use can_monitor_core::state::MonitorState;
//! use can_monitor_core::trace::TraceWriter;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! // Load signal definitions
//! let mut database = SignalDatabase::new();
//! for message in dbc::parse_dbc_file(Path::new("powertrain.dbc")).unwrap() {
//!     database.add_message(message);
//! }
//!
//! // Watch one signal with range limits
//! let state = Arc::new(MonitorState::new(vec![
//!     SignalWatch::new("EngineSpeed").with_limits(0.0, 8000.0),
//! ]));
//! let trace = Arc::new(TraceWriter::create(Path::new("logs/run.asc")).unwrap());
//!
//! // Replay a recorded trace through the full pipeline
//! let mut manager = IngestionManager::new(Arc::clone(&state), Arc::new(database), Arc::clone(&trace));
//! let source = AscReplaySource::open(Path::new("old_run.asc"), false).unwrap();
//! manager.add_source(Box::new(source));
//! manager.start().unwrap().join();
//! trace.close().unwrap();
//!
//! println!("Frames: {}, errors: {}", state.frames_received(), state.frames_errored());
//! ```

// Public modules
pub mod config;
pub mod ingest;
pub mod liveness;
pub mod message_decoder;
pub mod signals;
pub mod sources;
pub mod state;
pub mod trace;
pub mod types;

// Re-export main types for convenience
pub use config::SignalWatch;
pub use ingest::{IngestionManager, PipelineHandle};
pub use liveness::{BusStatus, LivenessMonitor, StallTracker};
pub use message_decoder::MessageDecoder;
pub use signals::{DatabaseStats, SignalDatabase};
pub use sources::{FrameSource, SourceError, SourceFrame};
pub use state::{IdRecord, MonitorState, SignalState};
pub use trace::TraceWriter;
pub use types::{
    CanFrame, DecodedMessage, DecodedSignal, MonitorError, Result, SignalValue,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
