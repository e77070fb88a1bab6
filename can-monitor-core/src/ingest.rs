//! Frame ingestion and the decode pipeline
//!
//! One reader thread per frame source feeds a bounded channel; a single
//! pipeline thread consumes it and performs all downstream work in frame
//! arrival order: counting, per-id bookkeeping, trace logging, matching,
//! decoding and state aggregation. Reader failures are isolated per
//! channel and retried with capped exponential backoff.

use crate::message_decoder::MessageDecoder;
use crate::signals::SignalDatabase;
use crate::sources::{FrameSource, SourceError};
use crate::state::MonitorState;
use crate::trace::TraceWriter;
use crate::types::{CanFrame, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Queue bound between the reader threads and the pipeline thread
const EVENT_QUEUE_CAPACITY: usize = 10_000;

/// Capped exponential backoff for transient read failures
struct Backoff {
    current: Duration,
}

impl Backoff {
    const INITIAL: Duration = Duration::from_millis(50);
    const MAX: Duration = Duration::from_secs(2);

    fn new() -> Self {
        Self {
            current: Self::INITIAL,
        }
    }

    /// Delay to sleep before the next retry; doubles up to the cap
    fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(Self::MAX);
        delay
    }

    /// Back to the initial delay after a successful read
    fn reset(&mut self) {
        self.current = Self::INITIAL;
    }
}

/// Owns the frame sources and runs the ingestion pipeline
///
/// Sources are registered in channel order (the first added source is
/// channel 0) and started together. The manager's creation time is the
/// shared epoch all frame timestamps are measured against.
pub struct IngestionManager {
    state: Arc<MonitorState>,
    database: Arc<SignalDatabase>,
    trace: Arc<TraceWriter>,
    epoch: Instant,
    sources: Vec<Box<dyn FrameSource>>,
}

impl IngestionManager {
    pub fn new(
        state: Arc<MonitorState>,
        database: Arc<SignalDatabase>,
        trace: Arc<TraceWriter>,
    ) -> Self {
        Self {
            state,
            database,
            trace,
            epoch: Instant::now(),
            sources: Vec::new(),
        }
    }

    /// Register a source; its channel index is its registration order
    pub fn add_source(&mut self, source: Box<dyn FrameSource>) {
        log::info!(
            "Registered source '{}' as channel {}",
            source.name(),
            self.sources.len()
        );
        self.sources.push(source);
    }

    /// Number of registered sources
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Spawn the reader threads and the pipeline thread
    ///
    /// The returned handle can be joined when every source terminates
    /// (replay, tests); live capture never joins and lets the threads die
    /// with the process.
    pub fn start(self) -> Result<PipelineHandle> {
        let (tx, rx) = bounded::<CanFrame>(EVENT_QUEUE_CAPACITY);

        let mut readers = Vec::new();
        for (index, source) in self.sources.into_iter().enumerate() {
            let tx = tx.clone();
            let state = Arc::clone(&self.state);
            let epoch = self.epoch;
            let handle = thread::Builder::new()
                .name(format!("reader-{}", index))
                .spawn(move || {
                    reader_loop(source, index as u8, epoch, state, tx);
                })?;
            readers.push(handle);
        }
        // The pipeline exits once every reader has dropped its sender
        drop(tx);

        let state = Arc::clone(&self.state);
        let database = Arc::clone(&self.database);
        let trace = Arc::clone(&self.trace);
        let pipeline = thread::Builder::new()
            .name("pipeline".to_string())
            .spawn(move || {
                pipeline_loop(rx, state, database, trace);
            })?;

        Ok(PipelineHandle { readers, pipeline })
    }
}

/// Handles to the running ingestion threads
pub struct PipelineHandle {
    readers: Vec<JoinHandle<()>>,
    pipeline: JoinHandle<()>,
}

impl PipelineHandle {
    /// Wait for every source to finish and the pipeline to drain
    ///
    /// Only returns for terminating sources; a live SocketCAN reader
    /// blocks forever, so live shutdown drops the handle instead.
    pub fn join(self) {
        for reader in self.readers {
            let _ = reader.join();
        }
        let _ = self.pipeline.join();
    }

    /// True once every reader has exited and the pipeline has drained
    pub fn is_finished(&self) -> bool {
        self.readers.iter().all(|r| r.is_finished()) && self.pipeline.is_finished()
    }
}

/// Reader thread body: blocking receive, stamp, forward
fn reader_loop(
    mut source: Box<dyn FrameSource>,
    channel: u8,
    epoch: Instant,
    state: Arc<MonitorState>,
    tx: Sender<CanFrame>,
) {
    let mut backoff = Backoff::new();

    loop {
        match source.receive() {
            Ok(raw) => {
                backoff.reset();
                let frame = CanFrame {
                    can_id: raw.can_id,
                    channel,
                    timestamp: epoch.elapsed().as_secs_f64(),
                    data: raw.data,
                    is_error_frame: raw.is_error_frame,
                };
                if tx.send(frame).is_err() {
                    // Pipeline is gone; nothing left to deliver to
                    break;
                }
            }
            Err(SourceError::Closed) => {
                log::info!("Source '{}' closed, reader exiting", source.name());
                break;
            }
            Err(SourceError::Receive(e)) => {
                state.record_error();
                let delay = backoff.next_delay();
                log::warn!(
                    "Read failure on '{}': {} (retrying in {:?})",
                    source.name(),
                    e,
                    delay
                );
                thread::sleep(delay);
            }
        }
    }
}

/// Pipeline thread body: the single consumer of the frame stream
///
/// Processing order per frame: global counter, error frame short-circuit,
/// per-id bookkeeping, trace record, match, decode, state update.
fn pipeline_loop(
    rx: Receiver<CanFrame>,
    state: Arc<MonitorState>,
    database: Arc<SignalDatabase>,
    trace: Arc<TraceWriter>,
) {
    for frame in rx.iter() {
        state.record_received();

        if frame.is_error_frame {
            state.record_error();
            log::debug!("Error frame on channel {}", frame.channel);
            continue;
        }

        let id_count = state.record_frame(&frame);

        if let Err(e) = trace.log_frame(&frame) {
            log::error!("Trace write failed: {}", e);
            state.record_error();
        }

        match database.match_frame(frame.can_id) {
            Some(definition) => {
                if let Some(decoded) = MessageDecoder::decode_message(&frame.data, definition) {
                    state.apply_decoded(&frame, &decoded, id_count);
                } else {
                    log::debug!(
                        "No signals decoded from 0x{:X} ({})",
                        frame.can_id,
                        definition.name
                    );
                }
            }
            None => {
                log::trace!("No definition matches id 0x{:X}", frame.can_id);
            }
        }
    }

    log::debug!("Pipeline drained, all sources closed");
}
