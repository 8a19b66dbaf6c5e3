//! CLI Exit Codes
//!
//! Exit codes of the `serdebug` binary, for scripting.

use crate::config::ConfigFileError;
use crate::core::port::OpenError;
use crate::core::transport::TransportError;
use std::process::ExitCode;

/// Exit code constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCodes;

impl ExitCodes {
    /// Success
    pub const SUCCESS: u8 = 0;

    /// General error
    pub const ERROR: u8 = 1;

    /// Invalid arguments
    pub const INVALID_ARGS: u8 = 2;

    /// Port open failed
    pub const CONNECTION_FAILED: u8 = 3;

    /// Permission denied
    pub const PERMISSION_DENIED: u8 = 7;

    /// Configuration error
    pub const CONFIG_ERROR: u8 = 8;

    /// Device busy
    pub const DEVICE_BUSY: u8 = 13;

    /// Port not found
    pub const PORT_NOT_FOUND: u8 = 14;

    /// Device disconnected during the session
    pub const DISCONNECTED: u8 = 18;
}

/// CLI operation result
#[derive(Debug)]
pub enum CliResult {
    /// Success with optional message
    Success(Option<String>),

    /// Error with code and message
    Error(u8, String),
}

impl CliResult {
    /// Plain success
    pub fn success() -> Self {
        Self::Success(None)
    }

    /// Error with explicit code
    pub fn error(code: u8, msg: impl Into<String>) -> Self {
        Self::Error(code, msg.into())
    }

    /// Get exit code
    pub fn code(&self) -> u8 {
        match self {
            Self::Success(_) => ExitCodes::SUCCESS,
            Self::Error(code, _) => *code,
        }
    }

    /// Get message
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success(Some(msg)) => Some(msg),
            Self::Error(_, msg) => Some(msg),
            Self::Success(None) => None,
        }
    }

    /// Convert to ExitCode
    pub fn to_exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }

    /// Is success?
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl From<&OpenError> for CliResult {
    fn from(err: &OpenError) -> Self {
        let code = match err {
            OpenError::TransportFailed { source, .. } => match source {
                TransportError::PortNotFound(_) => ExitCodes::PORT_NOT_FOUND,
                TransportError::PermissionDenied(_) => ExitCodes::PERMISSION_DENIED,
                TransportError::PortInUse(_) => ExitCodes::DEVICE_BUSY,
                _ => ExitCodes::CONNECTION_FAILED,
            },
            OpenError::InvalidConfig(_) => ExitCodes::INVALID_ARGS,
        };
        Self::Error(code, err.to_string())
    }
}

impl From<&ConfigFileError> for CliResult {
    fn from(err: &ConfigFileError) -> Self {
        Self::Error(ExitCodes::CONFIG_ERROR, err.to_string())
    }
}

/// Exit code description
pub fn exit_code_description(code: u8) -> &'static str {
    match code {
        0 => "Success",
        1 => "General error",
        2 => "Invalid arguments",
        3 => "Connection failed",
        7 => "Permission denied",
        8 => "Configuration error",
        13 => "Device busy",
        14 => "Port not found",
        18 => "Device disconnected",
        _ => "Unknown error",
    }
}
