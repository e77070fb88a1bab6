//! ASC trace replay source
//!
//! Reads a trace file produced by the trace logger (or any compatible
//! analyzer export) and feeds its frame records back through the pipeline.
//! Non-frame lines are skipped, so the preamble and trigger block markers
//! pass through harmlessly. With pacing enabled, delivery sleeps for the
//! recorded timestamp deltas to approximate the original bus timing.

use super::{FrameSource, SourceError, SourceFrame};
use crate::trace;
use crate::types::Result;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;
use std::thread;
use std::time::Duration;

/// Replays frames from an ASC trace file
pub struct AscReplaySource {
    name: String,
    lines: Lines<BufReader<File>>,
    paced: bool,
    last_timestamp: Option<f64>,
}

impl AscReplaySource {
    /// Open a trace file for replay
    pub fn open(path: &Path, paced: bool) -> Result<Self> {
        let file = File::open(path)?;
        log::info!("Replaying trace file {} (paced: {})", path.display(), paced);

        Ok(Self {
            name: format!("replay:{}", path.display()),
            lines: BufReader::new(file).lines(),
            paced,
            last_timestamp: None,
        })
    }
}

impl FrameSource for AscReplaySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn receive(&mut self) -> std::result::Result<SourceFrame, SourceError> {
        loop {
            let line = match self.lines.next() {
                Some(Ok(line)) => line,
                Some(Err(e)) => return Err(SourceError::Receive(e.to_string())),
                None => return Err(SourceError::Closed),
            };

            let frame = match trace::parse_frame_line(&line) {
                Some(frame) => frame,
                None => continue,
            };

            if self.paced {
                if let Some(prev) = self.last_timestamp {
                    let delta = frame.timestamp - prev;
                    if delta > 0.0 {
                        thread::sleep(Duration::from_secs_f64(delta));
                    }
                }
            }
            self.last_timestamp = Some(frame.timestamp);

            return Ok(SourceFrame {
                can_id: frame.can_id,
                data: frame.data,
                is_error_frame: false,
            });
        }
    }
}
