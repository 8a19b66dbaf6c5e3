//! Serial port transport implementation

use super::{Transport, TransportError, TransportType};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::fmt;
use std::io::{Read, Write};
use std::time::Duration;

/// Baud rate used when nothing else is configured
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Upper bound on how long a single write may block
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_millis(100);

/// Serial port data bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum SerialDataBits {
    /// 5 bits per character
    Five,
    /// 6 bits per character
    Six,
    /// 7 bits per character
    Seven,
    /// 8 bits per character
    #[default]
    Eight,
}

impl SerialDataBits {
    /// Number of bits
    pub fn bits(self) -> u8 {
        match self {
            Self::Five => 5,
            Self::Six => 6,
            Self::Seven => 7,
            Self::Eight => 8,
        }
    }
}

/// Out-of-range values fall back to eight bits.
impl From<u8> for SerialDataBits {
    fn from(bits: u8) -> Self {
        match bits {
            5 => Self::Five,
            6 => Self::Six,
            7 => Self::Seven,
            _ => Self::Eight,
        }
    }
}

impl From<SerialDataBits> for u8 {
    fn from(bits: SerialDataBits) -> Self {
        bits.bits()
    }
}

impl From<SerialDataBits> for DataBits {
    fn from(bits: SerialDataBits) -> Self {
        match bits {
            SerialDataBits::Five => DataBits::Five,
            SerialDataBits::Six => DataBits::Six,
            SerialDataBits::Seven => DataBits::Seven,
            SerialDataBits::Eight => DataBits::Eight,
        }
    }
}

/// Serial port stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum SerialStopBits {
    /// One stop bit
    #[default]
    One,
    /// Two stop bits
    Two,
}

impl SerialStopBits {
    /// Number of stop bits
    pub fn bits(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }
}

/// Anything but 2 falls back to one stop bit.
impl From<u8> for SerialStopBits {
    fn from(bits: u8) -> Self {
        match bits {
            2 => Self::Two,
            _ => Self::One,
        }
    }
}

impl From<SerialStopBits> for u8 {
    fn from(bits: SerialStopBits) -> Self {
        bits.bits()
    }
}

impl From<SerialStopBits> for StopBits {
    fn from(bits: SerialStopBits) -> Self {
        match bits {
            SerialStopBits::One => StopBits::One,
            SerialStopBits::Two => StopBits::Two,
        }
    }
}

/// Serial port parity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SerialParity {
    /// No parity
    #[default]
    None,
    /// Odd parity
    Odd,
    /// Even parity
    Even,
}

impl SerialParity {
    /// Single-letter form used in `8N1` notation
    pub fn letter(self) -> char {
        match self {
            Self::None => 'N',
            Self::Odd => 'O',
            Self::Even => 'E',
        }
    }
}

/// Unknown names fall back to no parity.
impl std::str::FromStr for SerialParity {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "odd" | "o" => Ok(Self::Odd),
            "even" | "e" => Ok(Self::Even),
            _ => Ok(Self::None),
        }
    }
}

impl From<SerialParity> for Parity {
    fn from(parity: SerialParity) -> Self {
        match parity {
            SerialParity::None => Parity::None,
            SerialParity::Odd => Parity::Odd,
            SerialParity::Even => Parity::Even,
        }
    }
}

/// Line configuration of one serial device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineConfig {
    /// Port name (e.g., COM3, /dev/ttyUSB0)
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits
    pub data_bits: SerialDataBits,
    /// Stop bits
    pub stop_bits: SerialStopBits,
    /// Parity
    pub parity: SerialParity,
}

impl LineConfig {
    /// Create a new configuration with 8N1 framing
    pub fn new(port: &str, baud_rate: u32) -> Self {
        Self {
            port: port.to_string(),
            baud_rate,
            data_bits: SerialDataBits::Eight,
            stop_bits: SerialStopBits::One,
            parity: SerialParity::None,
        }
    }

    /// Set data bits
    #[must_use]
    pub fn data_bits(mut self, bits: SerialDataBits) -> Self {
        self.data_bits = bits;
        self
    }

    /// Set stop bits
    #[must_use]
    pub fn stop_bits(mut self, bits: SerialStopBits) -> Self {
        self.stop_bits = bits;
        self
    }

    /// Set parity
    #[must_use]
    pub fn parity(mut self, parity: SerialParity) -> Self {
        self.parity = parity;
        self
    }
}

impl Default for LineConfig {
    fn default() -> Self {
        Self::new("", DEFAULT_BAUD_RATE)
    }
}

impl fmt::Display for LineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {} baud ({}{}{})",
            self.port,
            self.baud_rate,
            self.data_bits.bits(),
            self.parity.letter(),
            self.stop_bits.bits()
        )
    }
}

/// Serial port transport
pub struct SerialPortTransport {
    port: Option<Box<dyn SerialPort>>,
    active: Option<LineConfig>,
    write_timeout: Duration,
}

impl SerialPortTransport {
    /// Create a closed serial transport
    pub fn new() -> Self {
        Self {
            port: None,
            active: None,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }

    /// Set the bound on a single blocking write
    #[must_use]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    fn map_open_error(port: &str, e: &serialport::Error) -> TransportError {
        match e.kind() {
            serialport::ErrorKind::NoDevice => TransportError::PortNotFound(port.to_string()),
            serialport::ErrorKind::Io(io_kind) => match io_kind {
                std::io::ErrorKind::NotFound => TransportError::PortNotFound(port.to_string()),
                std::io::ErrorKind::PermissionDenied => {
                    TransportError::PermissionDenied(port.to_string())
                }
                std::io::ErrorKind::AddrInUse | std::io::ErrorKind::WouldBlock => {
                    TransportError::PortInUse(port.to_string())
                }
                _ => TransportError::ConnectionFailed(e.to_string()),
            },
            _ => TransportError::ConnectionFailed(e.to_string()),
        }
    }

    fn port_name(&self) -> String {
        self.active
            .as_ref()
            .map(|c| c.port.clone())
            .unwrap_or_default()
    }
}

impl Default for SerialPortTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for SerialPortTransport {
    fn open(&mut self, config: &LineConfig) -> Result<(), TransportError> {
        let port = serialport::new(&config.port, config.baud_rate)
            .data_bits(config.data_bits.into())
            .stop_bits(config.stop_bits.into())
            .parity(config.parity.into())
            .flow_control(FlowControl::None)
            .timeout(self.write_timeout)
            .open()
            .map_err(|e| Self::map_open_error(&config.port, &e))?;

        self.port = Some(port);
        self.active = Some(config.clone());
        Ok(())
    }

    fn close(&mut self) {
        self.port = None;
        self.active = None;
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn bytes_to_read(&mut self) -> Result<usize, TransportError> {
        let name = self.port_name();
        let port = self.port.as_mut().ok_or(TransportError::NotOpen)?;

        port.bytes_to_read()
            .map(|n| n as usize)
            .map_err(|e| TransportError::Disconnected(format!("{name}: {e}")))
    }

    fn read(&mut self, max: usize) -> Result<Bytes, TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::NotOpen)?;

        let available = port
            .bytes_to_read()
            .map_err(|e| TransportError::IoError(e.into()))? as usize;
        let wanted = available.min(max);
        if wanted == 0 {
            return Ok(Bytes::new());
        }

        let mut buffer = vec![0u8; wanted];
        match port.read(&mut buffer) {
            Ok(0) => Err(TransportError::Disconnected(self.port_name())),
            Ok(n) => {
                buffer.truncate(n);
                Ok(Bytes::from(buffer))
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(Bytes::new()),
            Err(e) => Err(TransportError::IoError(e)),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::NotOpen)?;

        let result = port.write_all(data).and_then(|()| port.flush());
        match result {
            Ok(()) => Ok(()),
            Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => Err(TransportError::Timeout),
            Err(e) => Err(TransportError::IoError(e)),
        }
    }

    fn active_config(&self) -> Option<LineConfig> {
        self.active.clone()
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Serial
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_bits_fallback() {
        assert_eq!(SerialDataBits::from(5), SerialDataBits::Five);
        assert_eq!(SerialDataBits::from(7), SerialDataBits::Seven);
        assert_eq!(SerialDataBits::from(9), SerialDataBits::Eight);
        assert_eq!(SerialDataBits::from(0), SerialDataBits::Eight);
    }

    #[test]
    fn test_stop_bits_fallback() {
        assert_eq!(SerialStopBits::from(2), SerialStopBits::Two);
        assert_eq!(SerialStopBits::from(1), SerialStopBits::One);
        assert_eq!(SerialStopBits::from(3), SerialStopBits::One);
    }

    #[test]
    fn test_parity_from_str() {
        assert_eq!("Odd".parse::<SerialParity>().unwrap(), SerialParity::Odd);
        assert_eq!("e".parse::<SerialParity>().unwrap(), SerialParity::Even);
        assert_eq!("mark".parse::<SerialParity>().unwrap(), SerialParity::None);
    }

    #[test]
    fn test_maps_onto_serialport() {
        assert_eq!(DataBits::from(SerialDataBits::Six), DataBits::Six);
        assert_eq!(StopBits::from(SerialStopBits::Two), StopBits::Two);
        assert_eq!(Parity::from(SerialParity::Even), Parity::Even);
    }

    #[test]
    fn test_line_config_display() {
        let config = LineConfig::new("COM3", 9600).parity(SerialParity::Even);
        assert_eq!(config.to_string(), "COM3 @ 9600 baud (8E1)");
    }

    #[test]
    fn test_closed_transport_reports_not_open() {
        let mut transport = SerialPortTransport::new();
        assert!(!transport.is_open());
        assert!(matches!(transport.bytes_to_read(), Err(TransportError::NotOpen)));
        assert!(matches!(transport.read(16), Err(TransportError::NotOpen)));
        assert!(matches!(transport.write(b"x"), Err(TransportError::NotOpen)));
    }

    #[test]
    fn test_open_missing_device_fails() {
        let mut transport = SerialPortTransport::new();
        let config = LineConfig::new("/dev/serdebug-does-not-exist", 9600);
        assert!(transport.open(&config).is_err());
        assert!(!transport.is_open());
        assert!(transport.active_config().is_none());
    }
}
