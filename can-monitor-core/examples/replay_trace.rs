//! Replay a recorded ASC trace through the monitoring pipeline
//!
//! Loads DBC signal definitions, replays the trace (full speed or paced)
//! and prints the aggregated signal state when the replay completes.
//!
//! Usage:
//!   replay_trace <trace.asc> [--dbc <file.dbc>] [--paced]
//!
//! Example:
//!   replay_trace can_log_01_Mar_2025_11h-22min-33sec.asc --dbc powertrain.dbc

use can_monitor_core::config::SignalWatch;
use can_monitor_core::ingest::IngestionManager;
use can_monitor_core::signals::{dbc, SignalDatabase};
use can_monitor_core::sources::AscReplaySource;
use can_monitor_core::state::MonitorState;
use can_monitor_core::trace::TraceWriter;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <trace.asc> [--dbc <file.dbc>] [--paced]", args[0]);
        std::process::exit(1);
    }

    let trace_file = PathBuf::from(&args[1]);
    let mut dbc_files = Vec::new();
    let mut paced = false;

    // Parse arguments
    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--dbc" => {
                i += 1;
                if i < args.len() {
                    dbc_files.push(PathBuf::from(&args[i]));
                }
            }
            "--paced" => {
                paced = true;
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
            }
        }
        i += 1;
    }

    // Load signal definitions
    let mut database = SignalDatabase::new();
    for dbc_file in &dbc_files {
        println!("Loading DBC: {:?}", dbc_file);
        for message in dbc::parse_dbc_file(dbc_file)? {
            database.add_message(message);
        }
    }

    let db_stats = database.stats();
    println!("\n=== SIGNAL DATABASE ===");
    println!("Messages: {}", db_stats.num_messages);
    println!("Signals: {}", db_stats.num_signals);

    // Watch every signal the database knows about
    let watches: Vec<SignalWatch> = database
        .messages()
        .iter()
        .flat_map(|message| message.signals.iter().map(|s| SignalWatch::new(&s.name)))
        .collect();

    let state = Arc::new(MonitorState::new(watches));
    let out_path = env::temp_dir().join("replay_out.asc");
    let trace = Arc::new(TraceWriter::create(&out_path)?);

    let mut manager =
        IngestionManager::new(Arc::clone(&state), Arc::new(database), Arc::clone(&trace));
    manager.add_source(Box::new(AscReplaySource::open(&trace_file, paced)?));

    println!("\n=== REPLAYING {} ===\n", trace_file.display());
    manager.start()?.join();
    trace.close()?;

    println!(
        "Frames: {}  Errors: {}",
        state.frames_received(),
        state.frames_errored()
    );

    println!("\n=== FINAL SIGNAL STATE ===");
    for signal in state.signal_snapshot() {
        println!(
            "  {}::{} = {} {}  (cycle {:.1} ms, count {}, ch {})",
            signal.message,
            signal.name,
            signal.display_value,
            signal.unit.as_deref().unwrap_or(""),
            signal.cycle_time_ms,
            signal.count,
            signal.channel
        );
    }

    println!("\nTrace written to {}", out_path.display());

    Ok(())
}
