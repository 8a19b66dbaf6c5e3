//! Data codec module for encoding/decoding data
//!
//! Two representations are supported in each direction:
//! - ASCII (UTF-8 text)
//! - Hexadecimal (space-separated uppercase byte pairs)

mod hex;
mod text;

pub use self::hex::{parse_hex, render_hex};
pub use self::text::{decode_text, DECODE_FAILURE_NOTICE};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Send/receive representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// UTF-8 text
    #[default]
    Ascii,
    /// Space-separated hex byte pairs
    Hex,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascii => write!(f, "ASCII"),
            Self::Hex => write!(f, "HEX"),
        }
    }
}

impl std::str::FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ascii" | "text" => Ok(Self::Ascii),
            "hex" => Ok(Self::Hex),
            other => Err(format!("unknown encoding: {other}")),
        }
    }
}

/// Line ending appended to outbound data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    /// Carriage Return only
    Cr,
    /// Line Feed only
    Lf,
    /// Both CR and LF
    #[default]
    CrLf,
}

impl LineEnding {
    /// Get the byte sequence for this line ending
    pub fn bytes(&self) -> &'static [u8] {
        match self {
            Self::Cr => b"\r",
            Self::Lf => b"\n",
            Self::CrLf => b"\r\n",
        }
    }
}

impl std::str::FromStr for LineEnding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cr" => Ok(Self::Cr),
            "lf" => Ok(Self::Lf),
            "crlf" => Ok(Self::CrLf),
            other => Err(format!("unknown line ending: {other}")),
        }
    }
}

/// Malformed hex input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Digits do not pair up
    #[error("Hex string must have an even number of digits")]
    OddLength,

    /// Non-hex character; position counts digits after whitespace is removed
    #[error("Invalid hex digit {ch:?} at position {position}")]
    InvalidDigit {
        /// Index into the whitespace-stripped digit stream
        position: usize,
        /// Offending character
        ch: char,
    },

    /// Decoded bytes are not valid UTF-8 text
    #[error("Hex data is not valid text")]
    NotText,
}

impl From<::hex::FromHexError> for ParseError {
    fn from(err: ::hex::FromHexError) -> Self {
        match err {
            ::hex::FromHexError::InvalidHexCharacter { c, index } => Self::InvalidDigit {
                position: index,
                ch: c,
            },
            ::hex::FromHexError::OddLength | ::hex::FromHexError::InvalidStringLength => {
                Self::OddLength
            }
        }
    }
}

/// Render received bytes for display.
///
/// HEX output always ends in exactly one `\n`. ASCII output ends in `\n`
/// or `\r`; an empty ASCII chunk renders as nothing.
pub fn decode_received(data: &[u8], encoding: Encoding) -> String {
    match encoding {
        Encoding::Hex => {
            let mut output = render_hex(data);
            output.push('\n');
            output
        }
        Encoding::Ascii => {
            if data.is_empty() {
                return String::new();
            }
            let mut output = decode_text(data);
            if !output.ends_with('\n') && !output.ends_with('\r') {
                output.push('\n');
            }
            output
        }
    }
}

/// Turn operator text into the bytes to write
pub fn encode_outbound(text: &str, encoding: Encoding) -> Result<Vec<u8>, ParseError> {
    match encoding {
        Encoding::Hex => parse_hex(text),
        Encoding::Ascii => Ok(text.as_bytes().to_vec()),
    }
}

/// Re-express a pending send buffer in another encoding.
///
/// HEX→ASCII fails when the buffer is not hex pairs or the bytes are not
/// UTF-8; ASCII→HEX always succeeds.
pub fn convert_pending(text: &str, from: Encoding, to: Encoding) -> Result<String, ParseError> {
    match (from, to) {
        (Encoding::Ascii, Encoding::Ascii) | (Encoding::Hex, Encoding::Hex) => Ok(text.to_string()),
        (Encoding::Ascii, Encoding::Hex) => Ok(render_hex(text.as_bytes())),
        (Encoding::Hex, Encoding::Ascii) => {
            let bytes = parse_hex(text)?;
            String::from_utf8(bytes).map_err(|_| ParseError::NotText)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_received_hex() {
        assert_eq!(decode_received(b"Hi\n", Encoding::Hex), "48 69 0A\n");
        assert_eq!(decode_received(&[], Encoding::Hex), "\n");
    }

    #[test]
    fn test_decode_received_ascii_newline_rules() {
        assert_eq!(decode_received(b"OK", Encoding::Ascii), "OK\n");
        assert_eq!(decode_received(b"OK\n", Encoding::Ascii), "OK\n");
        assert_eq!(decode_received(b"OK\r", Encoding::Ascii), "OK\r");
        assert_eq!(decode_received(b"", Encoding::Ascii), "");
    }

    #[test]
    fn test_decode_received_invalid_utf8() {
        let rendered = decode_received(&[0xFF, 0x41], Encoding::Ascii);
        assert_eq!(rendered, format!("{DECODE_FAILURE_NOTICE}FF 41\n"));
    }

    #[test]
    fn test_encode_outbound() {
        assert_eq!(encode_outbound("41 42 43", Encoding::Hex).unwrap(), vec![0x41, 0x42, 0x43]);
        assert_eq!(encode_outbound("4", Encoding::Hex), Err(ParseError::OddLength));
        assert_eq!(encode_outbound("héllo", Encoding::Ascii).unwrap(), "héllo".as_bytes());
    }

    #[test]
    fn test_convert_pending() {
        assert_eq!(convert_pending("AB", Encoding::Ascii, Encoding::Hex).unwrap(), "41 42");
        assert_eq!(convert_pending("41 42", Encoding::Hex, Encoding::Ascii).unwrap(), "AB");
        assert_eq!(
            convert_pending("zz", Encoding::Hex, Encoding::Ascii),
            Err(ParseError::InvalidDigit { position: 0, ch: 'z' })
        );
        assert_eq!(
            convert_pending("FF FE", Encoding::Hex, Encoding::Ascii),
            Err(ParseError::NotText)
        );
        assert_eq!(convert_pending("zz", Encoding::Hex, Encoding::Hex).unwrap(), "zz");
    }

    #[test]
    fn test_encoding_from_str() {
        assert_eq!("HEX".parse::<Encoding>().unwrap(), Encoding::Hex);
        assert_eq!("ascii".parse::<Encoding>().unwrap(), Encoding::Ascii);
        assert!("binary".parse::<Encoding>().is_err());
    }
}
