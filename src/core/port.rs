//! Port session: lifecycle and line configuration of one serial device
//!
//! The session exclusively owns its transport. Line configuration can
//! only change while the port is closed; every read and write after
//! `close()` fails with `NotOpen` instead of touching a stale handle.

use super::transport::{
    LineConfig, SerialDataBits, SerialParity, SerialStopBits, Transport, TransportError,
};
use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Configuration change refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Line settings are frozen while the port is open
    #[error("Cannot change configuration while port is open")]
    PortOpen,

    /// Baud rate must be positive
    #[error("Invalid baud rate: {0}")]
    InvalidBaudRate(u32),
}

/// Opening the port failed; the session is closed
#[derive(Debug, Error)]
pub enum OpenError {
    /// Device busy, missing or not permitted
    #[error("Port {port} open failed: {source}")]
    TransportFailed {
        /// Port that was being opened
        port: String,
        /// Underlying transport failure
        #[source]
        source: TransportError,
    },

    /// Configuration rejected before touching the device
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
}

/// Write failed; the session stays open
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteError {
    /// Device did not accept the data within its write timeout
    #[error("write timeout")]
    Timeout,

    /// Device refused the payload
    #[error("write rejected: {0}")]
    Rejected(String),

    /// No port is open
    #[error("Port not open")]
    NotOpen,
}

impl From<TransportError> for WriteError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout => Self::Timeout,
            TransportError::NotOpen => Self::NotOpen,
            TransportError::IoError(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {
                Self::Timeout
            }
            other => Self::Rejected(other.to_string()),
        }
    }
}

/// One serial device and its line configuration
#[derive(Debug)]
pub struct PortSession {
    transport: Box<dyn Transport>,
    config: LineConfig,
    is_open: bool,
}

impl PortSession {
    /// Create a closed session with default 115200 8N1 settings
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            config: LineConfig::default(),
            is_open: false,
        }
    }

    /// Check if the port is open
    pub fn is_open(&self) -> bool {
        self.is_open
    }

    /// Stored line configuration
    pub fn config(&self) -> &LineConfig {
        &self.config
    }

    /// Selected device identifier
    pub fn selected_port(&self) -> &str {
        &self.config.port
    }

    /// Configuration the device is actually running with
    pub fn active_config(&self) -> Option<LineConfig> {
        if self.is_open {
            self.transport.active_config()
        } else {
            None
        }
    }

    fn ensure_closed(&self) -> Result<(), ConfigError> {
        if self.is_open {
            Err(ConfigError::PortOpen)
        } else {
            Ok(())
        }
    }

    /// Select the device
    pub fn set_port(&mut self, port: &str) -> Result<(), ConfigError> {
        self.ensure_closed()?;
        self.config.port = port.to_string();
        Ok(())
    }

    /// Set baud rate
    pub fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), ConfigError> {
        self.ensure_closed()?;
        if baud_rate == 0 {
            return Err(ConfigError::InvalidBaudRate(baud_rate));
        }
        self.config.baud_rate = baud_rate;
        Ok(())
    }

    /// Set data bits
    pub fn set_data_bits(&mut self, bits: SerialDataBits) -> Result<(), ConfigError> {
        self.ensure_closed()?;
        self.config.data_bits = bits;
        Ok(())
    }

    /// Set stop bits
    pub fn set_stop_bits(&mut self, bits: SerialStopBits) -> Result<(), ConfigError> {
        self.ensure_closed()?;
        self.config.stop_bits = bits;
        Ok(())
    }

    /// Set parity
    pub fn set_parity(&mut self, parity: SerialParity) -> Result<(), ConfigError> {
        self.ensure_closed()?;
        self.config.parity = parity;
        Ok(())
    }

    /// Replace the whole line configuration
    pub fn set_config(&mut self, config: LineConfig) -> Result<(), ConfigError> {
        self.ensure_closed()?;
        if config.baud_rate == 0 {
            return Err(ConfigError::InvalidBaudRate(config.baud_rate));
        }
        self.config = config;
        Ok(())
    }

    /// Configure and open the device. An already open port is closed first.
    pub fn open(
        &mut self,
        port: &str,
        baud_rate: u32,
        data_bits: SerialDataBits,
        stop_bits: SerialStopBits,
        parity: SerialParity,
    ) -> Result<(), OpenError> {
        let config = LineConfig::new(port, baud_rate)
            .data_bits(data_bits)
            .stop_bits(stop_bits)
            .parity(parity);
        self.open_with(config)
    }

    /// Open with a complete line configuration
    pub fn open_with(&mut self, config: LineConfig) -> Result<(), OpenError> {
        if self.is_open {
            debug!("Port {} already open, closing before reopen", self.config.port);
            self.close();
        }
        self.set_config(config)?;
        self.reopen()
    }

    /// Open with the stored configuration. An already open port is closed first.
    pub fn reopen(&mut self) -> Result<(), OpenError> {
        if self.is_open {
            self.close();
        }

        match self.transport.open(&self.config) {
            Ok(()) => {
                self.is_open = true;
                info!("Opened {}", self.config);
                Ok(())
            }
            Err(source) => {
                warn!("Port {} open failed: {}", self.config.port, source);
                self.close();
                Err(OpenError::TransportFailed {
                    port: self.config.port.clone(),
                    source,
                })
            }
        }
    }

    /// Release the device. Always succeeds.
    pub fn close(&mut self) {
        if self.is_open {
            info!("Closed {}", self.config.port);
        }
        self.transport.close();
        self.is_open = false;
    }

    /// Read up to `max_bytes` of what is currently buffered
    pub fn raw_read(&mut self, max_bytes: usize) -> Result<Bytes, TransportError> {
        if !self.is_open {
            return Err(TransportError::NotOpen);
        }
        self.transport.read(max_bytes)
    }

    /// Write one payload
    pub fn raw_write(&mut self, data: &[u8]) -> Result<(), WriteError> {
        if !self.is_open {
            return Err(WriteError::NotOpen);
        }
        self.transport.write(data).map_err(|e| {
            warn!("Write of {} bytes to {} failed: {}", data.len(), self.config.port, e);
            WriteError::from(e)
        })
    }

    /// Buffered byte count, without consuming
    pub fn bytes_waiting(&mut self) -> Result<usize, TransportError> {
        if !self.is_open {
            return Err(TransportError::NotOpen);
        }
        self.transport.bytes_to_read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transport::{LoopbackTransport, MockTransport};

    fn loopback_session() -> (PortSession, crate::core::transport::LoopbackHandle) {
        let (transport, handle) = LoopbackTransport::pair();
        (PortSession::new(Box::new(transport)), handle)
    }

    #[test]
    fn test_new_session_is_closed() {
        let (session, _) = loopback_session();
        assert!(!session.is_open());
        assert_eq!(session.config().baud_rate, 115_200);
        assert!(session.active_config().is_none());
    }

    #[test]
    fn test_open_applies_configuration() {
        let (mut session, handle) = loopback_session();
        session
            .open("COM-test", 9600, SerialDataBits::Seven, SerialStopBits::Two, SerialParity::Odd)
            .unwrap();

        assert!(session.is_open());
        let active = handle.active_config().unwrap();
        assert_eq!(active.port, "COM-test");
        assert_eq!(active.baud_rate, 9600);
        assert_eq!(active.data_bits, SerialDataBits::Seven);
        assert_eq!(active.stop_bits, SerialStopBits::Two);
        assert_eq!(active.parity, SerialParity::Odd);
    }

    #[test]
    fn test_config_frozen_while_open() {
        let (mut session, handle) = loopback_session();
        session.open_with(LineConfig::new("COM-test", 9600)).unwrap();

        assert_eq!(session.set_baud_rate(115_200), Err(ConfigError::PortOpen));
        assert_eq!(session.set_port("COM9"), Err(ConfigError::PortOpen));
        assert_eq!(session.set_data_bits(SerialDataBits::Five), Err(ConfigError::PortOpen));
        assert_eq!(session.set_stop_bits(SerialStopBits::Two), Err(ConfigError::PortOpen));
        assert_eq!(session.set_parity(SerialParity::Even), Err(ConfigError::PortOpen));

        assert_eq!(session.config().baud_rate, 9600);
        assert_eq!(handle.active_config().unwrap().baud_rate, 9600);

        session.close();
        session.set_baud_rate(115_200).unwrap();
        assert_eq!(session.config().baud_rate, 115_200);
    }

    #[test]
    fn test_zero_baud_rejected() {
        let (mut session, handle) = loopback_session();
        assert_eq!(session.set_baud_rate(0), Err(ConfigError::InvalidBaudRate(0)));
        assert!(matches!(
            session.open_with(LineConfig::new("COM1", 0)),
            Err(OpenError::InvalidConfig(ConfigError::InvalidBaudRate(0)))
        ));
        assert!(!handle.is_open());
    }

    #[test]
    fn test_open_while_open_reopens() {
        let (mut session, handle) = loopback_session();
        session.open_with(LineConfig::new("COM1", 9600)).unwrap();
        session.open_with(LineConfig::new("COM2", 19200)).unwrap();

        assert!(session.is_open());
        assert_eq!(handle.active_config().unwrap().port, "COM2");
        assert_eq!(handle.active_config().unwrap().baud_rate, 19200);
    }

    #[test]
    fn test_close_is_idempotent() {
        let (mut session, _) = loopback_session();
        session.close();
        session.close();
        assert!(!session.is_open());

        session.open_with(LineConfig::new("COM1", 9600)).unwrap();
        session.close();
        session.close();
        assert!(!session.is_open());
    }

    #[test]
    fn test_io_after_close_is_not_open() {
        let (mut session, handle) = loopback_session();
        session.open_with(LineConfig::new("COM1", 9600)).unwrap();
        handle.push_rx(b"data");
        session.close();

        assert!(matches!(session.raw_read(4), Err(TransportError::NotOpen)));
        assert!(matches!(session.bytes_waiting(), Err(TransportError::NotOpen)));
        assert_eq!(session.raw_write(b"x"), Err(WriteError::NotOpen));
        assert_eq!(handle.pending_rx(), 4);
    }

    #[test]
    fn test_raw_read_is_bounded() {
        let (mut session, handle) = loopback_session();
        session.open_with(LineConfig::new("COM1", 9600)).unwrap();
        handle.push_rx(b"0123456789");

        assert_eq!(session.bytes_waiting().unwrap(), 10);
        assert_eq!(&session.raw_read(3).unwrap()[..], b"012");
        assert_eq!(session.bytes_waiting().unwrap(), 7);
    }

    #[test]
    fn test_open_failure_leaves_session_closed() {
        let mut transport = MockTransport::new();
        transport.expect_open().times(1).returning(|config| {
            Err(TransportError::PermissionDenied(config.port.clone()))
        });
        transport.expect_close().times(1).return_const(());

        let mut session = PortSession::new(Box::new(transport));
        let err = session.open_with(LineConfig::new("/dev/ttyS0", 9600)).unwrap_err();

        match err {
            OpenError::TransportFailed { port, source } => {
                assert_eq!(port, "/dev/ttyS0");
                assert!(matches!(source, TransportError::PermissionDenied(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!session.is_open());
    }

    #[test]
    fn test_write_errors_keep_session_open() {
        let mut transport = MockTransport::new();
        transport.expect_open().returning(|_| Ok(()));
        let mut calls = 0;
        transport.expect_write().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Err(TransportError::Timeout)
            } else {
                Err(TransportError::IoError(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "bad frame",
                )))
            }
        });

        let mut session = PortSession::new(Box::new(transport));
        session.open_with(LineConfig::new("COM1", 9600)).unwrap();

        assert_eq!(session.raw_write(b"a"), Err(WriteError::Timeout));
        assert!(matches!(session.raw_write(b"b"), Err(WriteError::Rejected(_))));
        assert!(session.is_open());
    }

    #[test]
    fn test_bytes_waiting_propagates_failure() {
        let mut transport = MockTransport::new();
        transport.expect_open().returning(|_| Ok(()));
        transport
            .expect_bytes_to_read()
            .returning(|| Err(TransportError::Disconnected("COM1".into())));

        let mut session = PortSession::new(Box::new(transport));
        session.open_with(LineConfig::new("COM1", 9600)).unwrap();

        assert!(matches!(session.bytes_waiting(), Err(TransportError::Disconnected(_))));
    }
}
