//! Session engine: idle-timeout framing of received data
//!
//! Raw serial streams carry no message boundaries. The engine is polled
//! on a fixed host tick and groups each burst of incoming bytes into one
//! displayable chunk: a chunk is flushed once the device's buffered byte
//! count has stayed the same for the idle timeout. A count that changes
//! on every poll is never flushed.
//!
//! Outbound text goes through the send encoding (and optional line
//! ending) before a single write on the port.

use super::clock::{Clock, TickClock};
use super::codec::{self, Encoding, LineEnding, ParseError};
use super::port::{ConfigError, OpenError, PortSession, WriteError};
use super::sink::{SessionEvent, Sink};
use super::transport::{
    LineConfig, SerialDataBits, SerialParity, SerialStopBits, Transport,
};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Idle time after which a stable burst is flushed
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(100);

/// Separator between the receive timestamp and the chunk
const TIMESTAMP_SEPARATOR: &str = "    ";

/// Sending failed; nothing was written
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// No port is open
    #[error("Port not opened yet")]
    NotOpen,

    /// Outbound hex text is malformed
    #[error("Wrong hex data format in send area: {0}")]
    Parse(#[from] ParseError),

    /// The port refused the write
    #[error(transparent)]
    Write(#[from] WriteError),
}

/// Result of one poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll {
    /// Port is closed; nothing happened
    Closed,
    /// Nothing buffered
    Idle,
    /// Bytes buffered but the burst is not complete yet
    Receiving {
        /// Buffered byte count seen this tick
        waiting: usize,
    },
    /// A chunk was read and emitted
    Flushed {
        /// Bytes read for the chunk
        bytes: usize,
    },
    /// Device failed; the port was closed and the sink told
    Disconnected,
}

/// Receive/send settings of an engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// How received chunks are rendered
    pub recv_encoding: Encoding,
    /// How outbound text is interpreted
    pub send_encoding: Encoding,
    /// Prefix received chunks with local time
    pub add_timestamp: bool,
    /// Append `line_ending` to every send
    pub append_line_ending: bool,
    /// Bytes appended when `append_line_ending` is set
    pub line_ending: LineEnding,
    /// Idle time that completes a burst
    pub idle_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            recv_encoding: Encoding::Ascii,
            send_encoding: Encoding::Ascii,
            add_timestamp: false,
            append_line_ending: false,
            line_ending: LineEnding::CrLf,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

/// Tick-driven framing engine around one [`PortSession`]
#[derive(Debug)]
pub struct FramingEngine {
    port: PortSession,
    clock: Box<dyn Clock>,
    sink: Box<dyn Sink>,
    settings: EngineSettings,
    tick_counter: u64,
    last_activity_tick: u64,
    last_known_waiting: usize,
}

impl FramingEngine {
    /// Create an engine ticking at the default 60 Hz
    pub fn new(transport: Box<dyn Transport>, sink: Box<dyn Sink>) -> Self {
        Self::with_clock(transport, Box::new(TickClock::default()), sink)
    }

    /// Create an engine with an explicit time source
    pub fn with_clock(
        transport: Box<dyn Transport>,
        clock: Box<dyn Clock>,
        sink: Box<dyn Sink>,
    ) -> Self {
        Self {
            port: PortSession::new(transport),
            clock,
            sink,
            settings: EngineSettings::default(),
            tick_counter: 0,
            last_activity_tick: 0,
            last_known_waiting: 0,
        }
    }

    /// Replace all settings
    #[must_use]
    pub fn settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Current settings
    pub fn current_settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// The underlying port session
    pub fn port(&self) -> &PortSession {
        &self.port
    }

    /// Select the device (refused while open)
    pub fn set_port(&mut self, port: &str) -> Result<(), ConfigError> {
        self.port.set_port(port)
    }

    /// Set baud rate (refused while open)
    pub fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), ConfigError> {
        self.port.set_baud_rate(baud_rate)
    }

    /// Set data bits (refused while open)
    pub fn set_data_bits(&mut self, bits: SerialDataBits) -> Result<(), ConfigError> {
        self.port.set_data_bits(bits)
    }

    /// Set stop bits (refused while open)
    pub fn set_stop_bits(&mut self, bits: SerialStopBits) -> Result<(), ConfigError> {
        self.port.set_stop_bits(bits)
    }

    /// Set parity (refused while open)
    pub fn set_parity(&mut self, parity: SerialParity) -> Result<(), ConfigError> {
        self.port.set_parity(parity)
    }

    /// Check if the port is open
    pub fn is_open(&self) -> bool {
        self.port.is_open()
    }

    /// Open the port and restart the idle clock
    pub fn open(&mut self, config: LineConfig) -> Result<(), OpenError> {
        self.port.open_with(config)?;
        self.reset_counters();
        Ok(())
    }

    /// Reopen with the port's stored configuration
    pub fn reopen(&mut self) -> Result<(), OpenError> {
        self.port.reopen()?;
        self.reset_counters();
        Ok(())
    }

    /// Close the port
    pub fn close(&mut self) {
        self.port.close();
    }

    fn reset_counters(&mut self) {
        self.clock.reset();
        self.tick_counter = 0;
        self.last_activity_tick = 0;
        self.last_known_waiting = 0;
    }

    /// Idle timeout expressed in clock ticks
    pub fn idle_timeout_ticks(&self) -> u64 {
        self.clock.ticks_for(self.settings.idle_timeout)
    }

    /// Run one framing step. Call once per host tick.
    pub fn poll(&mut self) -> Poll {
        if !self.port.is_open() {
            return Poll::Closed;
        }

        self.tick_counter = self.clock.advance();

        let waiting = match self.port.bytes_waiting() {
            Ok(n) => n,
            Err(e) => return self.disconnect(&e),
        };

        if waiting == 0 {
            return Poll::Idle;
        }

        if waiting != self.last_known_waiting {
            self.last_known_waiting = waiting;
            self.last_activity_tick = self.tick_counter;
            return Poll::Receiving { waiting };
        }

        let idle = self.tick_counter.saturating_sub(self.last_activity_tick);
        if idle < self.idle_timeout_ticks() {
            return Poll::Receiving { waiting };
        }

        let data = match self.port.raw_read(self.last_known_waiting) {
            Ok(data) => data,
            Err(e) => return self.disconnect(&e),
        };
        debug!("Flushing {} bytes after {} idle ticks", data.len(), idle);

        let text = self.render(&data);
        self.sink.emit(SessionEvent::Data(text));
        self.last_activity_tick = self.tick_counter;
        self.last_known_waiting = 0;

        Poll::Flushed { bytes: data.len() }
    }

    fn disconnect(&mut self, cause: &dyn std::error::Error) -> Poll {
        let port = self.port.selected_port().to_string();
        warn!("Port {} disconnected or has issue: {}", port, cause);
        self.port.close();
        self.sink.emit(SessionEvent::Disconnected { port });
        Poll::Disconnected
    }

    fn render(&self, data: &[u8]) -> String {
        let body = codec::decode_received(data, self.settings.recv_encoding);
        if self.settings.add_timestamp {
            let stamp = self.clock.local_time().format("%H:%M:%S%.3f");
            format!("{stamp}{TIMESTAMP_SEPARATOR}{body}")
        } else {
            body
        }
    }

    /// Encode and write operator text. Returns the number of bytes written.
    pub fn send(&mut self, text: &str) -> Result<usize, SendError> {
        if !self.port.is_open() {
            return Err(SendError::NotOpen);
        }

        let mut payload = codec::encode_outbound(text, self.settings.send_encoding)?;
        if self.settings.append_line_ending {
            payload.extend_from_slice(self.settings.line_ending.bytes());
        }

        self.port.raw_write(&payload)?;
        debug!("Sent {} bytes", payload.len());
        Ok(payload.len())
    }

    /// Set how future chunks are rendered
    pub fn set_recv_encoding(&mut self, encoding: Encoding) {
        if self.settings.recv_encoding != encoding {
            info!("receive encoding: {}", encoding);
        }
        self.settings.recv_encoding = encoding;
    }

    /// Switch the send encoding, converting the host's pending buffer.
    ///
    /// If the buffer cannot be converted it is cleared and the error
    /// returned; the encoding switches either way.
    pub fn set_send_encoding(
        &mut self,
        encoding: Encoding,
        pending: &mut String,
    ) -> Result<(), ParseError> {
        let from = self.settings.send_encoding;
        self.settings.send_encoding = encoding;
        if from == encoding {
            return Ok(());
        }
        info!("send encoding: {}", encoding);

        match codec::convert_pending(pending, from, encoding) {
            Ok(converted) => {
                *pending = converted;
                Ok(())
            }
            Err(e) => {
                warn!("Cannot convert send buffer to {}: {}", encoding, e);
                pending.clear();
                Err(e)
            }
        }
    }

    /// Prefix received chunks with a timestamp
    pub fn set_add_timestamp(&mut self, enabled: bool) {
        self.settings.add_timestamp = enabled;
    }

    /// Append the line ending to every send
    pub fn set_append_line_ending(&mut self, enabled: bool) {
        self.settings.append_line_ending = enabled;
    }

    /// Choose the appended line ending
    pub fn set_line_ending(&mut self, line_ending: LineEnding) {
        self.settings.line_ending = line_ending;
    }

    /// Set the idle timeout that completes a burst
    pub fn set_idle_timeout(&mut self, timeout: Duration) {
        self.settings.idle_timeout = timeout;
    }
}
