//! Operator commands typed into the interactive terminal
//!
//! Lines starting with `:` control the session; every other line is
//! sent through the engine. `::` escapes a literal leading colon.

use crate::core::codec::Encoding;
use crate::core::transport::{SerialDataBits, SerialParity, SerialStopBits};
use std::path::PathBuf;
use thiserror::Error;

/// Prefix marking an operator command
pub const COMMAND_PREFIX: char = ':';

/// One parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputLine {
    /// Text to send
    Send(String),
    /// Session control
    Command(OperatorCommand),
}

/// Session control commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    /// Switch receive rendering
    RecvEncoding(Encoding),
    /// Switch send interpretation
    SendEncoding(Encoding),
    /// Toggle receive timestamps
    Timestamp(bool),
    /// Toggle line ending on send
    LineEnding(bool),
    /// Select the device (port must be closed)
    Port(String),
    /// Set baud rate (port must be closed)
    Baud(u32),
    /// Set data bits (port must be closed)
    DataBits(SerialDataBits),
    /// Set stop bits (port must be closed)
    StopBits(SerialStopBits),
    /// Set parity (port must be closed)
    Parity(SerialParity),
    /// Empty the pending send buffer
    ClearSend,
    /// Open the port with the current settings
    Open,
    /// Close the port
    Close,
    /// Clear the transcript
    Clear,
    /// Save the transcript
    Save(Option<PathBuf>),
    /// Show available commands
    Help,
    /// Leave the terminal
    Quit,
}

/// Malformed operator command
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Unrecognised command word
    #[error("Unknown command: {0} (try :help)")]
    Unknown(String),

    /// Missing or invalid argument
    #[error("Usage: {0}")]
    Usage(&'static str),
}

/// Help text listing the operator commands
pub const HELP: &str = "\
:recv ascii|hex      receive display encoding
:send ascii|hex      send input encoding
:timestamp on|off    prefix received data with local time
:lineend on|off      append line ending to sent data
:port NAME           select the device (while closed)
:baud N              baud rate (while closed)
:databits 5|6|7|8    data bits (while closed)
:stopbits 1|2        stop bits (while closed)
:parity none|odd|even
                     parity (while closed)
:clearsend           empty the pending send buffer
:open | :close       open or close the port
:clear               clear the transcript
:save [PATH]         save the transcript
:help                this text
:quit                exit";

fn parse_switch(arg: Option<&str>, usage: &'static str) -> Result<bool, CommandError> {
    match arg.map(str::to_lowercase).as_deref() {
        Some("on" | "true" | "1" | "yes") => Ok(true),
        Some("off" | "false" | "0" | "no") => Ok(false),
        _ => Err(CommandError::Usage(usage)),
    }
}

fn parse_encoding(arg: Option<&str>, usage: &'static str) -> Result<Encoding, CommandError> {
    arg.and_then(|a| a.parse().ok())
        .ok_or(CommandError::Usage(usage))
}

fn parse_data_bits(arg: Option<&str>) -> Result<SerialDataBits, CommandError> {
    match arg.and_then(|a| a.parse::<u8>().ok()) {
        Some(bits @ 5..=8) => Ok(SerialDataBits::from(bits)),
        _ => Err(CommandError::Usage(":databits 5|6|7|8")),
    }
}

fn parse_stop_bits(arg: Option<&str>) -> Result<SerialStopBits, CommandError> {
    match arg.and_then(|a| a.parse::<u8>().ok()) {
        Some(bits @ 1..=2) => Ok(SerialStopBits::from(bits)),
        _ => Err(CommandError::Usage(":stopbits 1|2")),
    }
}

fn parse_parity(arg: Option<&str>) -> Result<SerialParity, CommandError> {
    match arg.map(str::to_lowercase).as_deref() {
        Some("none" | "n") => Ok(SerialParity::None),
        Some("odd" | "o") => Ok(SerialParity::Odd),
        Some("even" | "e") => Ok(SerialParity::Even),
        _ => Err(CommandError::Usage(":parity none|odd|even")),
    }
}

/// Classify one input line (without its trailing newline)
pub fn parse_line(line: &str) -> Result<InputLine, CommandError> {
    let Some(rest) = line.strip_prefix(COMMAND_PREFIX) else {
        return Ok(InputLine::Send(line.to_string()));
    };
    if rest.starts_with(COMMAND_PREFIX) {
        return Ok(InputLine::Send(rest.to_string()));
    }

    let mut words = rest.split_whitespace();
    let word = words.next().unwrap_or_default().to_lowercase();
    let arg = words.next();

    let command = match word.as_str() {
        "recv" => OperatorCommand::RecvEncoding(parse_encoding(arg, ":recv ascii|hex")?),
        "send" => OperatorCommand::SendEncoding(parse_encoding(arg, ":send ascii|hex")?),
        "timestamp" | "ts" => OperatorCommand::Timestamp(parse_switch(arg, ":timestamp on|off")?),
        "lineend" | "le" => OperatorCommand::LineEnding(parse_switch(arg, ":lineend on|off")?),
        "port" => OperatorCommand::Port(
            arg.ok_or(CommandError::Usage(":port NAME"))?.to_string(),
        ),
        "baud" => OperatorCommand::Baud(
            arg.and_then(|a| a.parse::<u32>().ok())
                .filter(|&baud| baud > 0)
                .ok_or(CommandError::Usage(":baud N"))?,
        ),
        "databits" => OperatorCommand::DataBits(parse_data_bits(arg)?),
        "stopbits" => OperatorCommand::StopBits(parse_stop_bits(arg)?),
        "parity" => OperatorCommand::Parity(parse_parity(arg)?),
        "clearsend" => OperatorCommand::ClearSend,
        "open" => OperatorCommand::Open,
        "close" => OperatorCommand::Close,
        "clear" => OperatorCommand::Clear,
        "save" => OperatorCommand::Save(arg.map(PathBuf::from)),
        "help" | "?" => OperatorCommand::Help,
        "quit" | "q" | "exit" => OperatorCommand::Quit,
        _ => return Err(CommandError::Unknown(word)),
    };
    Ok(InputLine::Command(command))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_lines_are_sent() {
        assert_eq!(parse_line("AT+GMR").unwrap(), InputLine::Send("AT+GMR".into()));
        assert_eq!(parse_line("").unwrap(), InputLine::Send(String::new()));
        assert_eq!(parse_line("::colon").unwrap(), InputLine::Send(":colon".into()));
    }

    #[test]
    fn test_encoding_commands() {
        assert_eq!(
            parse_line(":recv hex").unwrap(),
            InputLine::Command(OperatorCommand::RecvEncoding(Encoding::Hex))
        );
        assert_eq!(
            parse_line(":send ASCII").unwrap(),
            InputLine::Command(OperatorCommand::SendEncoding(Encoding::Ascii))
        );
        assert_eq!(parse_line(":recv"), Err(CommandError::Usage(":recv ascii|hex")));
        assert_eq!(parse_line(":send octal"), Err(CommandError::Usage(":send ascii|hex")));
    }

    #[test]
    fn test_switch_commands() {
        assert_eq!(
            parse_line(":timestamp on").unwrap(),
            InputLine::Command(OperatorCommand::Timestamp(true))
        );
        assert_eq!(
            parse_line(":le off").unwrap(),
            InputLine::Command(OperatorCommand::LineEnding(false))
        );
        assert!(parse_line(":timestamp maybe").is_err());
    }

    #[test]
    fn test_line_settings_commands() {
        assert_eq!(
            parse_line(":port /dev/ttyUSB1").unwrap(),
            InputLine::Command(OperatorCommand::Port("/dev/ttyUSB1".into()))
        );
        assert_eq!(
            parse_line(":baud 9600").unwrap(),
            InputLine::Command(OperatorCommand::Baud(9600))
        );
        assert_eq!(
            parse_line(":databits 7").unwrap(),
            InputLine::Command(OperatorCommand::DataBits(SerialDataBits::Seven))
        );
        assert_eq!(
            parse_line(":stopbits 2").unwrap(),
            InputLine::Command(OperatorCommand::StopBits(SerialStopBits::Two))
        );
        assert_eq!(
            parse_line(":parity E").unwrap(),
            InputLine::Command(OperatorCommand::Parity(SerialParity::Even))
        );
        assert_eq!(
            parse_line(":clearsend").unwrap(),
            InputLine::Command(OperatorCommand::ClearSend)
        );
    }

    #[test]
    fn test_line_settings_reject_bad_values() {
        assert_eq!(parse_line(":port"), Err(CommandError::Usage(":port NAME")));
        assert_eq!(parse_line(":baud 0"), Err(CommandError::Usage(":baud N")));
        assert_eq!(parse_line(":baud fast"), Err(CommandError::Usage(":baud N")));
        assert_eq!(parse_line(":databits 9"), Err(CommandError::Usage(":databits 5|6|7|8")));
        assert_eq!(parse_line(":stopbits 3"), Err(CommandError::Usage(":stopbits 1|2")));
        assert_eq!(parse_line(":parity mark"), Err(CommandError::Usage(":parity none|odd|even")));
    }

    #[test]
    fn test_save_path() {
        assert_eq!(
            parse_line(":save /tmp/log.txt").unwrap(),
            InputLine::Command(OperatorCommand::Save(Some(PathBuf::from("/tmp/log.txt"))))
        );
        assert_eq!(
            parse_line(":save").unwrap(),
            InputLine::Command(OperatorCommand::Save(None))
        );
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(parse_line(":reboot"), Err(CommandError::Unknown("reboot".into())));
    }
}
