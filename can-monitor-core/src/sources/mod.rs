//! Frame sources
//!
//! A frame source produces raw frames for one bus channel through a
//! blocking `receive` call. The ingestion layer owns the sources, stamps
//! their output with channel index and pipeline timestamp, and handles
//! retry on transient failures. Production sources are SocketCAN (Linux)
//! and ASC trace replay; tests provide scripted in-memory sources.

pub mod replay;
#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub mod socketcan;

pub use replay::AscReplaySource;
#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub use socketcan::SocketCanSource;

/// Failure modes of a source read
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Transient failure; the read should be retried
    #[error("receive failure: {0}")]
    Receive(String),

    /// The source will never deliver another frame
    #[error("channel closed")]
    Closed,
}

/// A raw frame as delivered by a source, before ingestion stamping
///
/// Channel index and timestamp are assigned by the reader thread, not by
/// the source.
#[derive(Debug, Clone)]
pub struct SourceFrame {
    /// CAN message id
    pub can_id: u32,
    /// Payload bytes
    pub data: Vec<u8>,
    /// True if the bus reported an error frame
    pub is_error_frame: bool,
}

/// Blocking frame producer for one bus channel
pub trait FrameSource: Send {
    /// Short name for log output (interface or file)
    fn name(&self) -> &str;

    /// Block until the next frame arrives
    fn receive(&mut self) -> Result<SourceFrame, SourceError>;
}
