//! CLI Module
//!
//! Provides command-line interface functionality including:
//! - Exit codes for automation
//! - Operator command parsing for the interactive terminal

pub mod command;
pub mod exit_codes;

pub use command::{parse_line, CommandError, InputLine, OperatorCommand, HELP};
pub use exit_codes::{exit_code_description, CliResult, ExitCodes};
