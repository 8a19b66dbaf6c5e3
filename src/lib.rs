//! # Serdebug Core Library
//!
//! A serial port debugging terminal library:
//! - Port session lifecycle with line configuration (baud, data/stop bits, parity)
//! - Idle-timeout framing: each burst of received bytes becomes one chunk
//! - ASCII or HEX rendering of received data
//! - ASCII or HEX interpretation of sent data
//! - Receive timestamps and optional line endings on send
//!
//! The engine is single-threaded and tick-driven: the host calls
//! [`FramingEngine::poll`] at a fixed rate and forwards user actions.
//!
//! ## Example
//!
//! ```rust,no_run
//! use serdebug_core::{ChannelSink, FramingEngine, LineConfig, SerialPortTransport, SessionEvent};
//!
//! let (sink, events) = ChannelSink::new();
//! let mut engine = FramingEngine::new(Box::new(SerialPortTransport::new()), Box::new(sink));
//! engine.open(LineConfig::new("/dev/ttyUSB0", 115200))?;
//! engine.send("AT\r\n")?;
//!
//! loop {
//!     engine.poll();
//!     for event in events.try_iter() {
//!         match event {
//!             SessionEvent::Data(text) => print!("{text}"),
//!             SessionEvent::Disconnected { port } => return Err(format!("{port} went away").into()),
//!         }
//!     }
//!     std::thread::sleep(std::time::Duration::from_millis(16));
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod core;

// Re-exports for convenience
pub use crate::cli::{CliResult, ExitCodes};
pub use crate::config::{AppConfig, SerialSettings, TerminalSettings};
pub use crate::core::clock::{Clock, TickClock, WallClock};
pub use crate::core::codec::{Encoding, LineEnding, ParseError};
pub use crate::core::port::{ConfigError, OpenError, PortSession, WriteError};
pub use crate::core::session::{EngineSettings, FramingEngine, Poll, SendError};
pub use crate::core::sink::{ChannelSink, SessionEvent, Sink};
pub use crate::core::transcript::Transcript;
pub use crate::core::transport::{
    LineConfig, LoopbackHandle, LoopbackTransport, SerialDataBits, SerialParity,
    SerialPortTransport, SerialStopBits, Transport, TransportError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
