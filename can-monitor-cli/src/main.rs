//! CAN Bus Monitor CLI Application
//!
//! Command-line front end for the can-monitor-core library. It owns:
//! - Argument parsing and JSON configuration loading
//! - Opening bus channels (SocketCAN) or a trace replay source
//! - The terminal display loop
//! - Ctrl-C handling and graceful shutdown (trace footer)

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use can_monitor_core::ingest::{IngestionManager, PipelineHandle};
use can_monitor_core::liveness::{LivenessMonitor, DEFAULT_SAMPLE_INTERVAL};
use can_monitor_core::signals::{dbc, SignalDatabase};
use can_monitor_core::sources::{AscReplaySource, FrameSource};
use can_monitor_core::state::MonitorState;
use can_monitor_core::trace::{self, TraceWriter};

mod config;
mod display;

/// CAN Bus Monitor - live signal monitoring with ASC trace logging
#[derive(Parser, Debug)]
#[command(name = "can-monitor")]
#[command(about = "Monitor CAN bus traffic, decode signals and write ASC traces", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the JSON configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory searched for a single JSON config when --config is absent
    #[arg(long, value_name = "DIR", default_value = "config")]
    config_dir: PathBuf,

    /// Replay an ASC trace file instead of opening bus channels
    #[arg(long, value_name = "FILE")]
    replay: Option<PathBuf>,

    /// Pace the replay by the recorded timestamps
    #[arg(long, requires = "replay")]
    paced: bool,

    /// Directory for trace log files (created if missing)
    #[arg(long, value_name = "DIR", default_value = "logs")]
    log_dir: PathBuf,

    /// Display refresh interval in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 500)]
    refresh_ms: u64,

    /// Which table to display
    #[arg(long, value_enum, default_value = "signals")]
    view: display::ViewMode,

    /// Run without the terminal display
    #[arg(long)]
    headless: bool,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("CAN Bus Monitor v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using monitor library v{}", can_monitor_core::VERSION);

    run(args)
}

fn run(args: Args) -> Result<()> {
    // Configuration: explicit file or directory discovery
    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => config::discover_config(&args.config_dir)?,
    };
    let app_config = config::load_config(&config_path)?;
    log::info!("Configuration loaded from {:?}", config_path);

    // Signal databases, in listed order (earlier files win on id clashes)
    let mut database = SignalDatabase::new();
    for dbc_path in &app_config.databases {
        let messages = dbc::parse_dbc_file(dbc_path)
            .with_context(|| format!("Failed to load signal database {:?}", dbc_path))?;
        for message in messages {
            database.add_message(message);
        }
    }
    let stats = database.stats();
    log::info!(
        "Signal database ready: {} messages, {} signals",
        stats.num_messages,
        stats.num_signals
    );

    // Watch list; an explicit list also pre-filters the database so the
    // decoder skips signals nobody is watching
    let configured = config::dedup_watches(app_config.signals.clone());
    let explicit = !configured.is_empty();
    let watches = config::effective_watches(configured, &database);
    if explicit {
        let watched: std::collections::HashSet<String> =
            watches.iter().map(|w| w.name.clone()).collect();
        database.retain_signals(|name| watched.contains(name));
    }

    // Trace file
    std::fs::create_dir_all(&args.log_dir)
        .with_context(|| format!("Failed to create log directory {:?}", args.log_dir))?;
    let trace_path = trace::timestamped_log_path(&args.log_dir);
    let trace = Arc::new(
        TraceWriter::create(&trace_path)
            .with_context(|| format!("Failed to create trace file {:?}", trace_path))?,
    );

    // Pipeline wiring
    let state = Arc::new(MonitorState::new(watches));
    let mut manager =
        IngestionManager::new(Arc::clone(&state), Arc::new(database), Arc::clone(&trace));

    if let Some(replay_path) = &args.replay {
        let source = AscReplaySource::open(replay_path, args.paced)
            .with_context(|| format!("Failed to open replay trace {:?}", replay_path))?;
        manager.add_source(Box::new(source));
    } else {
        if app_config.channels.is_empty() {
            bail!(
                "No channels configured in {:?} and no --replay given",
                config_path
            );
        }
        for channel in &app_config.channels {
            manager.add_source(open_channel(channel)?);
        }
    }

    let handle = manager.start().context("Failed to start ingestion pipeline")?;
    let liveness = LivenessMonitor::spawn(Arc::clone(&state), DEFAULT_SAMPLE_INTERVAL)
        .context("Failed to start liveness monitor")?;

    // Ctrl-C flips the run flag; the loop below notices and shuts down
    let running = Arc::new(AtomicBool::new(true));
    let run_flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        run_flag.store(false, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl-C handler")?;

    // The pipeline thread keeps its own Arc to the trace writer, so the
    // footer has to come from an explicit close on every exit path
    let display_result = display_loop(&args, &running, &handle, &state, &liveness, &trace);
    finish(&trace, display_result)?;

    println!();
    println!("Trace written to {}", trace.path().display());
    println!(
        "Frames received: {}   errors: {}",
        state.frames_received(),
        state.frames_errored()
    );

    Ok(())
}

/// Refresh the terminal until Ctrl-C fires, a replay drains, or writing
/// to the terminal fails
fn display_loop(
    args: &Args,
    running: &AtomicBool,
    handle: &PipelineHandle,
    state: &MonitorState,
    liveness: &LivenessMonitor,
    trace: &TraceWriter,
) -> Result<()> {
    let refresh = Duration::from_millis(args.refresh_ms.max(50));
    let replay_mode = args.replay.is_some();
    let mut stdout = io::stdout();

    while running.load(Ordering::SeqCst) {
        if replay_mode && handle.is_finished() {
            break;
        }
        if !args.headless {
            write!(
                stdout,
                "{}{}",
                display::CLEAR_SCREEN,
                display::render(state, liveness.status(), trace.path(), args.view)
            )
            .context("Failed to write to the terminal")?;
            stdout.flush().context("Failed to write to the terminal")?;
        }
        thread::sleep(refresh);
    }

    Ok(())
}

/// Finalize the trace, then surface the display loop's outcome
///
/// The footer is written even when the loop failed; a close error is only
/// reported if the loop itself ended cleanly.
fn finish(trace: &TraceWriter, display_result: Result<()>) -> Result<()> {
    let close_result = trace.close().context("Failed to finalize trace file");
    display_result?;
    close_result
}

/// Open one configured bus channel as a frame source
#[cfg(all(target_os = "linux", feature = "socketcan"))]
fn open_channel(channel: &config::ChannelConfig) -> Result<Box<dyn FrameSource>> {
    use can_monitor_core::sources::SocketCanSource;

    match channel.interface.as_str() {
        "socketcan" => {
            let source = SocketCanSource::open(&channel.channel)?;
            if let Some(bitrate) = channel.bitrate {
                log::debug!(
                    "Channel {} nominal bitrate {} bit/s",
                    channel.channel,
                    bitrate
                );
            }
            Ok(Box::new(source))
        }
        other => bail!(
            "Unsupported interface type '{}' for channel '{}'",
            other,
            channel.channel
        ),
    }
}

#[cfg(not(all(target_os = "linux", feature = "socketcan")))]
fn open_channel(channel: &config::ChannelConfig) -> Result<Box<dyn FrameSource>> {
    bail!(
        "Channel '{}' requires Linux with the 'socketcan' feature (use --replay here)",
        channel.channel
    )
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
