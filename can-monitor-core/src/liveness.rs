//! Bus liveness detection
//!
//! Derives a binary "receiving / stalled" status from the global frame
//! counter. A periodic worker samples the counter; if it fails to grow
//! for a cumulative two seconds the bus is considered stalled. The
//! decision logic lives in [`StallTracker`], a pure state machine fed
//! (count, interval) pairs, so it is testable without threads or clocks.

use crate::state::MonitorState;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Counter growth must resume within this window, else the bus is stalled
const STALL_THRESHOLD: Duration = Duration::from_secs(2);

/// Default sampling interval for the liveness worker
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(500);

/// Bus liveness as shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusStatus {
    /// Frames are arriving
    Active,
    /// No counter growth for the stall threshold (also the initial state)
    Stalled,
}

impl fmt::Display for BusStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusStatus::Active => write!(f, "receiving"),
            BusStatus::Stalled => write!(f, "stalled"),
        }
    }
}

/// Stall detection state machine
///
/// Feed it the current frame counter and the time elapsed since the
/// previous sample; it accumulates idle time and flips the status.
pub struct StallTracker {
    last_count: u64,
    idle: Duration,
    status: BusStatus,
}

impl StallTracker {
    pub fn new() -> Self {
        Self {
            last_count: 0,
            idle: Duration::ZERO,
            status: BusStatus::Stalled,
        }
    }

    /// Current status without observing a new sample
    pub fn status(&self) -> BusStatus {
        self.status
    }

    /// Observe one counter sample taken `interval` after the previous one
    pub fn observe(&mut self, count: u64, interval: Duration) -> BusStatus {
        if count != self.last_count {
            self.last_count = count;
            self.idle = Duration::ZERO;
            self.status = BusStatus::Active;
        } else {
            self.idle += interval;
            if self.idle >= STALL_THRESHOLD {
                self.status = BusStatus::Stalled;
            }
        }
        self.status
    }
}

impl Default for StallTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Background liveness worker
///
/// Samples the shared frame counter on its own thread and publishes the
/// derived status through an atomic flag. Read-only for consumers; the
/// worker never influences ingestion or logging.
pub struct LivenessMonitor {
    active: Arc<AtomicBool>,
}

impl LivenessMonitor {
    /// Spawn the sampling thread
    ///
    /// The thread is detached and runs for the life of the process.
    pub fn spawn(state: Arc<MonitorState>, interval: Duration) -> crate::types::Result<Self> {
        let active = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&active);

        thread::Builder::new()
            .name("liveness".to_string())
            .spawn(move || {
                let mut tracker = StallTracker::new();
                loop {
                    thread::sleep(interval);
                    let status = tracker.observe(state.frames_received(), interval);
                    flag.store(status == BusStatus::Active, Ordering::Relaxed);
                }
            })?;

        Ok(Self { active })
    }

    /// Latest published status
    pub fn status(&self) -> BusStatus {
        if self.active.load(Ordering::Relaxed) {
            BusStatus::Active
        } else {
            BusStatus::Stalled
        }
    }
}
