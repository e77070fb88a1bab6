//! SocketCAN frame source (Linux only)

use super::{FrameSource, SourceError, SourceFrame};
use crate::types::{MonitorError, Result};
use socketcan::{CanFrame as RawFrame, CanSocket, EmbeddedFrame, Frame, Socket, SocketOptions};

/// Live capture from a SocketCAN network interface
pub struct SocketCanSource {
    name: String,
    socket: CanSocket,
}

impl SocketCanSource {
    /// Open a raw CAN socket on the named interface (e.g. "can0")
    ///
    /// Error frame reporting is enabled best-effort; a kernel that
    /// refuses the option still delivers data frames.
    pub fn open(interface: &str) -> Result<Self> {
        let socket = CanSocket::open(interface).map_err(|e| {
            MonitorError::BusError(format!("failed to open interface {}: {}", interface, e))
        })?;

        if let Err(e) = socket.set_error_filter_accept_all() {
            log::warn!(
                "Error frame reporting unavailable on {}: {}",
                interface,
                e
            );
        }

        log::info!("Opened SocketCAN interface {}", interface);

        Ok(Self {
            name: interface.to_string(),
            socket,
        })
    }
}

impl FrameSource for SocketCanSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn receive(&mut self) -> std::result::Result<SourceFrame, SourceError> {
        loop {
            match self.socket.read_frame() {
                Ok(RawFrame::Data(frame)) => {
                    return Ok(SourceFrame {
                        can_id: frame.raw_id(),
                        data: frame.data().to_vec(),
                        is_error_frame: false,
                    })
                }
                Ok(RawFrame::Error(_)) => {
                    return Ok(SourceFrame {
                        can_id: 0,
                        data: Vec::new(),
                        is_error_frame: true,
                    })
                }
                Ok(RawFrame::Remote(_)) => {
                    // Remote transmission requests carry no data to decode
                    log::trace!("Ignoring remote frame on '{}'", self.name);
                }
                Err(e) => return Err(SourceError::Receive(e.to_string())),
            }
        }
    }
}
