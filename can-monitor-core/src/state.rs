//! Shared monitoring state
//!
//! This module owns the authoritative tables the display reads: per-signal
//! state keyed by signal name, per-id bookkeeping for every frame id seen
//! on the bus, and the global frame/error counters. The tables are mutated
//! only through the pipeline thread; readers take cloned snapshots, so a
//! snapshot is consistent per entry but not across entries.

use crate::config::SignalWatch;
use crate::types::{CanFrame, DecodedMessage, SignalValue};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Tracked state for a single watched signal
///
/// Created lazily on the first successful decode of the signal and updated
/// in place afterwards; entries are never removed during a run.
#[derive(Debug, Clone)]
pub struct SignalState {
    /// Signal name (table key)
    pub name: String,
    /// Name of the message the signal was last decoded from
    pub message: String,
    /// Last decoded physical value
    pub value: SignalValue,
    /// Textual form of the value, refreshed when the value changes
    pub display_value: String,
    /// Engineering unit from the signal database
    pub unit: Option<String>,
    /// Timestamp of the last update (seconds since the pipeline epoch)
    pub last_update: f64,
    /// Time between the last two observations, milliseconds, one decimal
    pub cycle_time_ms: f64,
    /// Occurrence count, mirrored from the carrying frame id's count
    pub count: u64,
    /// Channel index the signal was last received on
    pub channel: u8,
    /// True if the last value change left the configured limits
    pub out_of_range: bool,
}

/// Per-frame-id bookkeeping
///
/// Updated for every valid frame whether or not it matches a message
/// definition, so the counts also cover unknown ids.
#[derive(Debug, Clone)]
pub struct IdRecord {
    /// CAN frame id
    pub can_id: u32,
    /// Number of frames received with this id
    pub count: u64,
    /// Timestamp of the most recent frame (seconds since the epoch)
    pub last_timestamp: f64,
    /// Time between the last two frames, milliseconds, one decimal
    pub cycle_time_ms: f64,
    /// Channel index of the most recent frame
    pub channel: u8,
    /// Payload of the most recent frame
    pub data: Vec<u8>,
}

impl IdRecord {
    /// Data length code of the most recent frame
    pub fn dlc(&self) -> usize {
        self.data.len()
    }
}

/// Shared state container for one monitoring run
///
/// Holds the watch list, both state tables and the global counters. The
/// pipeline thread is the only writer of the tables; counters may be
/// bumped from reader threads as well.
pub struct MonitorState {
    watches: Vec<SignalWatch>,
    signals: Mutex<HashMap<String, SignalState>>,
    ids: Mutex<HashMap<u32, IdRecord>>,
    frames_received: AtomicU64,
    frames_errored: AtomicU64,
}

impl MonitorState {
    /// Create state for the given watch list
    pub fn new(watches: Vec<SignalWatch>) -> Self {
        Self {
            watches,
            signals: Mutex::new(HashMap::new()),
            ids: Mutex::new(HashMap::new()),
            frames_received: AtomicU64::new(0),
            frames_errored: AtomicU64::new(0),
        }
    }

    /// The configured watch list, in configuration order
    pub fn watches(&self) -> &[SignalWatch] {
        &self.watches
    }

    /// Count one received item (valid or error frame)
    pub fn record_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one error (error frame, read failure or trace-write failure)
    pub fn record_error(&self) {
        self.frames_errored.fetch_add(1, Ordering::Relaxed);
    }

    /// Total received items so far
    pub fn frames_received(&self) -> u64 {
        self.frames_received.load(Ordering::Relaxed)
    }

    /// Total errors so far
    pub fn frames_errored(&self) -> u64 {
        self.frames_errored.load(Ordering::Relaxed)
    }

    /// Update the per-id table for a valid frame
    ///
    /// Returns the id's occurrence count including this frame; the caller
    /// feeds it to [`MonitorState::apply_decoded`] so signal counts mirror
    /// the id count exactly.
    pub fn record_frame(&self, frame: &CanFrame) -> u64 {
        let mut ids = self.ids.lock();
        match ids.get_mut(&frame.can_id) {
            Some(record) => {
                record.count += 1;
                record.cycle_time_ms =
                    round_cycle((frame.timestamp - record.last_timestamp) * 1000.0);
                record.last_timestamp = frame.timestamp;
                record.channel = frame.channel;
                record.data = frame.data.clone();
                record.count
            }
            None => {
                ids.insert(
                    frame.can_id,
                    IdRecord {
                        can_id: frame.can_id,
                        count: 1,
                        last_timestamp: frame.timestamp,
                        cycle_time_ms: 0.0,
                        channel: frame.channel,
                        data: frame.data.clone(),
                    },
                );
                1
            }
        }
    }

    /// Fold a decoded message into the signal table
    ///
    /// Only signals with a matching watch entry are tracked. Timing,
    /// count and channel refresh on every accepted update; the stored
    /// value and range flag change only when the value itself changes.
    ///
    /// # Arguments
    /// * `frame` - The carrying frame (channel and timestamp attribution)
    /// * `decoded` - Decoder output for the frame
    /// * `id_count` - The carrying id's count from [`MonitorState::record_frame`]
    pub fn apply_decoded(&self, frame: &CanFrame, decoded: &DecodedMessage, id_count: u64) {
        let mut signals = self.signals.lock();

        for sig in &decoded.signals {
            let watch = match self.watch_for(&sig.name, &decoded.message_name) {
                Some(watch) => watch,
                None => {
                    log::trace!(
                        "Signal '{}' from message '{}' is not watched",
                        sig.name,
                        decoded.message_name
                    );
                    continue;
                }
            };

            match signals.get_mut(&sig.name) {
                Some(state) => {
                    state.cycle_time_ms =
                        round_cycle((frame.timestamp - state.last_update) * 1000.0);
                    state.last_update = frame.timestamp;
                    state.count = id_count;
                    state.channel = frame.channel;
                    state.message = decoded.message_name.clone();

                    if state.value != sig.value {
                        state.value = sig.value.clone();
                        state.display_value = sig.value.to_string();
                        state.out_of_range = watch.is_out_of_range(&sig.value);
                    }
                }
                None => {
                    signals.insert(
                        sig.name.clone(),
                        SignalState {
                            name: sig.name.clone(),
                            message: decoded.message_name.clone(),
                            value: sig.value.clone(),
                            display_value: sig.value.to_string(),
                            unit: sig.unit.clone(),
                            last_update: frame.timestamp,
                            cycle_time_ms: 0.0,
                            count: id_count,
                            channel: frame.channel,
                            out_of_range: watch.is_out_of_range(&sig.value),
                        },
                    );
                }
            }
        }
    }

    /// Snapshot of all tracked signals, sorted by name
    pub fn signal_snapshot(&self) -> Vec<SignalState> {
        let signals = self.signals.lock();
        let mut snapshot: Vec<SignalState> = signals.values().cloned().collect();
        snapshot.sort_by(|a, b| a.name.cmp(&b.name));
        snapshot
    }

    /// Snapshot of all per-id records, sorted by id
    pub fn id_snapshot(&self) -> Vec<IdRecord> {
        let ids = self.ids.lock();
        let mut snapshot: Vec<IdRecord> = ids.values().cloned().collect();
        snapshot.sort_by_key(|record| record.can_id);
        snapshot
    }

    /// Tracked state for one signal, if it has been seen
    pub fn signal(&self, name: &str) -> Option<SignalState> {
        self.signals.lock().get(name).cloned()
    }

    /// First watch entry accepting this signal/message combination
    fn watch_for(&self, signal_name: &str, message_name: &str) -> Option<&SignalWatch> {
        self.watches
            .iter()
            .find(|watch| watch.name == signal_name && watch.accepts_message(message_name))
    }
}

/// Round a cycle time to one decimal place
fn round_cycle(ms: f64) -> f64 {
    (ms * 10.0).round() / 10.0
}
