//! Persisted port and terminal settings

use crate::core::clock::DEFAULT_TICK_RATE_HZ;
use crate::core::codec::{Encoding, LineEnding};
use crate::core::session::EngineSettings;
use crate::core::transcript::Transcript;
use crate::core::transport::{LineConfig, SerialParity, DEFAULT_BAUD_RATE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration file errors
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// No platform configuration directory
    #[error("Could not determine config directory")]
    NoConfigDir,

    /// Reading or writing the file failed
    #[error("Config file {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File contents are not valid TOML for this schema
    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Settings could not be serialized
    #[error("Cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Serial line settings
    pub serial: SerialSettings,
    /// Terminal settings
    pub terminal: TerminalSettings,
}

impl AppConfig {
    /// Load config from the default location; defaults if the file is missing
    pub fn load() -> Result<Self, ConfigFileError> {
        let path = super::config_path().ok_or(ConfigFileError::NoConfigDir)?;
        Self::load_from(&path)
    }

    /// Load config from `path`; defaults if the file is missing
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<PathBuf, ConfigFileError> {
        let path = super::config_path().ok_or(ConfigFileError::NoConfigDir)?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save config to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        let io_err = |source| ConfigFileError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(io_err)
    }
}

/// Serial line settings as stored on disk.
///
/// Data and stop bits are kept as plain numbers; out-of-range values
/// fall back to 8 and 1 when converted to a [`LineConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    /// Port name (e.g., COM3, /dev/ttyUSB0)
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits (5, 6, 7, 8)
    pub data_bits: u8,
    /// Stop bits (1, 2)
    pub stop_bits: u8,
    /// Parity
    pub parity: SerialParity,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: 8,
            stop_bits: 1,
            parity: SerialParity::None,
        }
    }
}

impl SerialSettings {
    /// Convert to a line configuration
    pub fn to_line_config(&self) -> LineConfig {
        LineConfig::new(&self.port, self.baud_rate)
            .data_bits(self.data_bits.into())
            .stop_bits(self.stop_bits.into())
            .parity(self.parity)
    }
}

/// Transcript cap used when the config file names none
pub const DEFAULT_TRANSCRIPT_MAX_BYTES: usize = 1024 * 1024;

/// Terminal settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalSettings {
    /// Receive display encoding
    pub recv_encoding: Encoding,
    /// Send input encoding
    pub send_encoding: Encoding,
    /// Prefix received chunks with local time
    pub add_timestamp: bool,
    /// Append the line ending to every send
    pub append_line_ending: bool,
    /// Line ending type
    pub line_ending: LineEnding,
    /// Idle time that completes a received burst
    pub idle_timeout_ms: u64,
    /// Host poll rate
    pub tick_rate_hz: u32,
    /// Bound on a single blocking write
    pub write_timeout_ms: u64,
    /// Measure idle time in wall-clock milliseconds instead of poll ticks
    pub wall_clock: bool,
    /// Transcript size cap in bytes; 0 keeps everything
    pub transcript_max_bytes: usize,
}

impl Default for TerminalSettings {
    fn default() -> Self {
        Self {
            recv_encoding: Encoding::Ascii,
            send_encoding: Encoding::Ascii,
            add_timestamp: false,
            append_line_ending: false,
            line_ending: LineEnding::CrLf,
            idle_timeout_ms: 100,
            tick_rate_hz: DEFAULT_TICK_RATE_HZ,
            write_timeout_ms: 100,
            wall_clock: false,
            transcript_max_bytes: DEFAULT_TRANSCRIPT_MAX_BYTES,
        }
    }
}

impl TerminalSettings {
    /// Engine settings derived from these terminal settings
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            recv_encoding: self.recv_encoding,
            send_encoding: self.send_encoding,
            add_timestamp: self.add_timestamp,
            append_line_ending: self.append_line_ending,
            line_ending: self.line_ending,
            idle_timeout: Duration::from_millis(self.idle_timeout_ms),
        }
    }

    /// Empty transcript honouring the size cap
    pub fn transcript(&self) -> Transcript {
        match self.transcript_max_bytes {
            0 => Transcript::new(),
            max => Transcript::new().max_len(max),
        }
    }

    /// Host tick period
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs(1) / self.tick_rate_hz.max(1)
    }
}
