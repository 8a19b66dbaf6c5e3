//! Transport layer for the serial session
//!
//! A transport is the device end of a session. The session engine only
//! ever talks to it through [`Transport`], which keeps every call
//! non-blocking (reads and queue queries) or bounded (writes).
//!
//! Implementations:
//! - [`SerialPortTransport`] - physical and virtual serial devices
//! - [`LoopbackTransport`] - in-memory device for tests and demos

mod loopback;
mod serial;

pub use loopback::{LoopbackHandle, LoopbackTransport};
pub use serial::{
    LineConfig, SerialDataBits, SerialParity, SerialPortTransport, SerialStopBits,
    DEFAULT_BAUD_RATE, DEFAULT_WRITE_TIMEOUT,
};

use bytes::Bytes;
use std::fmt;
use thiserror::Error;

/// Transport type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportType {
    /// Serial port
    Serial,
    /// In-memory loopback
    Loopback,
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial => write!(f, "Serial"),
            Self::Loopback => write!(f, "Loopback"),
        }
    }
}

/// Transport error types
#[derive(Error, Debug)]
pub enum TransportError {
    /// Operation attempted on a closed transport
    #[error("Port not open")]
    NotOpen,

    /// Port not found
    #[error("Port not found: {0}")]
    PortNotFound(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Port already in use
    #[error("Port already in use: {0}")]
    PortInUse(String),

    /// Opening the device failed for another reason
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Write did not complete within the write timeout
    #[error("Write timeout")]
    Timeout,

    /// Device went away
    #[error("Disconnected: {0}")]
    Disconnected(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Device seam used by [`PortSession`](crate::core::port::PortSession).
///
/// `bytes_to_read` and `read` must return immediately. `write` may block
/// for at most the transport's own write timeout.
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send {
    /// Apply the line configuration and open the device
    fn open(&mut self, config: &LineConfig) -> Result<(), TransportError>;

    /// Release the device. Safe to call when already closed.
    fn close(&mut self);

    /// Check if the device is held open
    fn is_open(&self) -> bool;

    /// Number of received bytes buffered by the device, without consuming them
    fn bytes_to_read(&mut self) -> Result<usize, TransportError>;

    /// Read up to `max` buffered bytes; empty when nothing is buffered
    fn read(&mut self, max: usize) -> Result<Bytes, TransportError>;

    /// Write the whole payload
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Line configuration the open device is running with
    fn active_config(&self) -> Option<LineConfig>;

    /// Get transport type
    fn transport_type(&self) -> TransportType;
}

impl fmt::Debug for dyn Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("type", &self.transport_type())
            .field("open", &self.is_open())
            .finish()
    }
}
