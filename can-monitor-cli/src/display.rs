//! Terminal display
//!
//! Renders the shared monitoring state as a refreshing text table. Two
//! views: one row per watched signal, or one row per seen frame id. Both
//! share a status header with bus liveness, the global counters and the
//! trace file path. Rendering builds a plain string so it stays testable;
//! the caller clears the screen and prints.

use can_monitor_core::liveness::BusStatus;
use can_monitor_core::state::MonitorState;
use std::collections::HashSet;
use std::fmt::Write;
use std::path::Path;

/// ANSI sequence clearing the screen and homing the cursor
pub const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Which table the display shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ViewMode {
    /// One row per watched signal
    Signals,
    /// One row per seen frame id
    Messages,
}

/// Render one full display frame
pub fn render(
    state: &MonitorState,
    status: BusStatus,
    trace_path: &Path,
    view: ViewMode,
) -> String {
    let mut out = String::new();
    render_header(&mut out, state, status, trace_path);
    match view {
        ViewMode::Signals => render_signals(&mut out, state),
        ViewMode::Messages => render_messages(&mut out, state),
    }
    out
}

fn render_header(out: &mut String, state: &MonitorState, status: BusStatus, trace_path: &Path) {
    let status_cell = match status {
        BusStatus::Active => format!("{}{}{}", GREEN, status, RESET),
        BusStatus::Stalled => format!("{}{}{}", RED, status, RESET),
    };

    let _ = writeln!(
        out,
        "{}CAN Bus Monitor{}   bus: {}   frames: {}   errors: {}",
        BOLD,
        RESET,
        status_cell,
        state.frames_received(),
        state.frames_errored()
    );
    let _ = writeln!(out, "trace: {}", trace_path.display());
    let _ = writeln!(out);
}

fn render_signals(out: &mut String, state: &MonitorState) {
    let _ = writeln!(
        out,
        "{:<40} {:>14} {:<8} {:>10} {:>8} {:>3}",
        "SIGNAL", "VALUE", "UNIT", "CYCLE ms", "COUNT", "CH"
    );

    let mut rendered: HashSet<&str> = HashSet::new();
    for watch in state.watches() {
        if !rendered.insert(watch.name.as_str()) {
            continue;
        }

        match state.signal(&watch.name) {
            Some(signal) => {
                let label = format!("{}::{}", signal.message, signal.name);
                // Pad before coloring so escape codes don't skew the column
                let value_cell = format!("{:>14}", signal.display_value);
                let value_cell = if signal.out_of_range {
                    format!("{}{}{}", RED, value_cell, RESET)
                } else {
                    value_cell
                };
                let _ = writeln!(
                    out,
                    "{:<40} {} {:<8} {:>10.1} {:>8} {:>3}",
                    label,
                    value_cell,
                    signal.unit.as_deref().unwrap_or("-"),
                    signal.cycle_time_ms,
                    signal.count,
                    signal.channel
                );
            }
            None => {
                let label = if watch.message.is_empty() {
                    watch.name.clone()
                } else {
                    format!("{}::{}", watch.message, watch.name)
                };
                let _ = writeln!(
                    out,
                    "{:<40} {:>14} {:<8} {:>10} {:>8} {:>3}",
                    label, "-", "-", "-", "-", "-"
                );
            }
        }
    }
}

fn render_messages(out: &mut String, state: &MonitorState) {
    let _ = writeln!(
        out,
        "{:<9} {:>3}  {:<24} {:>10} {:>8} {:>3}",
        "ID", "DLC", "DATA", "CYCLE ms", "COUNT", "CH"
    );

    for record in state.id_snapshot() {
        let data: Vec<String> = record.data.iter().map(|b| format!("{:02X}", b)).collect();
        let _ = writeln!(
            out,
            "{:08X}  {:>3}  {:<24} {:>10.1} {:>8} {:>3}",
            record.can_id,
            record.dlc(),
            data.join(" "),
            record.cycle_time_ms,
            record.count,
            record.channel
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use can_monitor_core::config::SignalWatch;
    use can_monitor_core::types::{CanFrame, DecodedMessage, DecodedSignal, SignalValue};

    fn populated_state() -> MonitorState {
        let state = MonitorState::new(vec![
            SignalWatch::new("EngineSpeed").with_limits(0.0, 1000.0),
            SignalWatch::new("NeverSeen").with_message("Ghost"),
        ]);

        let frame = CanFrame {
            can_id: 0x1FE02345,
            channel: 0,
            timestamp: 0.5,
            data: vec![0x01, 0x02],
            is_error_frame: false,
        };
        state.record_received();
        let count = state.record_frame(&frame);
        state.apply_decoded(
            &frame,
            &DecodedMessage {
                message_name: "EngineData".to_string(),
                signals: vec![DecodedSignal {
                    name: "EngineSpeed".to_string(),
                    value: SignalValue::Float(1500.0),
                    unit: Some("rpm".to_string()),
                    raw_value: 6000,
                }],
            },
            count,
        );
        state
    }

    #[test]
    fn test_signals_view_shows_tracked_and_pending_rows() {
        let state = populated_state();
        let out = render(
            &state,
            BusStatus::Active,
            Path::new("logs/run.asc"),
            ViewMode::Signals,
        );

        assert!(out.contains("EngineData::EngineSpeed"));
        assert!(out.contains("rpm"));
        assert!(out.contains("Ghost::NeverSeen"));
        assert!(out.contains("logs/run.asc"));
    }

    #[test]
    fn test_out_of_range_value_is_red() {
        let state = populated_state();
        let out = render(
            &state,
            BusStatus::Active,
            Path::new("run.asc"),
            ViewMode::Signals,
        );

        // 1500.0 exceeds the watch maximum of 1000.0
        assert!(out.contains(&format!("{}{:>14}{}", RED, "1500.000", RESET)));
    }

    #[test]
    fn test_messages_view_lists_seen_ids() {
        let state = populated_state();
        let out = render(
            &state,
            BusStatus::Active,
            Path::new("run.asc"),
            ViewMode::Messages,
        );

        assert!(out.contains("1FE02345"));
        assert!(out.contains("01 02"));
    }

    #[test]
    fn test_header_reflects_status_and_counters() {
        let state = populated_state();

        let active = render(&state, BusStatus::Active, Path::new("r.asc"), ViewMode::Signals);
        assert!(active.contains("receiving"));
        assert!(active.contains("frames: 1"));

        let stalled = render(&state, BusStatus::Stalled, Path::new("r.asc"), ViewMode::Signals);
        assert!(stalled.contains(&format!("{}stalled{}", RED, RESET)));
    }
}
