//! Hexadecimal rendering and parsing

use super::ParseError;

/// Render bytes as uppercase pairs separated by single spaces (e.g. "48 65 6C")
pub fn render_hex(data: &[u8]) -> String {
    let mut output = String::with_capacity(data.len() * 3);

    for (i, byte) in data.iter().enumerate() {
        if i > 0 {
            output.push(' ');
        }
        output.push_str(&format!("{:02X}", byte));
    }

    output
}

/// Parse whitespace-separated hex pairs into bytes.
///
/// Whitespace anywhere is ignored, so "4142 43" and "41 42 43" parse the
/// same. No partial result is produced on error.
pub fn parse_hex(text: &str) -> Result<Vec<u8>, ParseError> {
    let digits: String = text.split_whitespace().collect();
    Ok(::hex::decode(digits)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_upper() {
        assert_eq!(render_hex(b"Hello"), "48 65 6C 6C 6F");
        assert_eq!(render_hex(&[0x00, 0xAB, 0xFF]), "00 AB FF");
        assert_eq!(render_hex(&[]), "");
    }

    #[test]
    fn test_parse() {
        assert_eq!(parse_hex("41 42 43").unwrap(), vec![0x41, 0x42, 0x43]);
        assert_eq!(parse_hex("  4142\t43\n").unwrap(), vec![0x41, 0x42, 0x43]);
        assert_eq!(parse_hex("6c 6C").unwrap(), vec![0x6C, 0x6C]);
        assert!(parse_hex("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_odd_length() {
        assert_eq!(parse_hex("4"), Err(ParseError::OddLength));
        assert_eq!(parse_hex("41 4"), Err(ParseError::OddLength));
    }

    #[test]
    fn test_parse_invalid_digit() {
        assert_eq!(
            parse_hex("41 G2"),
            Err(ParseError::InvalidDigit { position: 2, ch: 'G' })
        );
        assert!(parse_hex("0x41").is_err());
    }

    #[test]
    fn test_render_then_parse_recovers_bytes() {
        let data: Vec<u8> = (0..=255).collect();
        assert_eq!(parse_hex(&render_hex(&data)).unwrap(), data);

        let samples: [&[u8]; 4] = [b"", b"\x00", b"\r\n", b"\xde\xad\xbe\xef"];
        for sample in samples {
            assert_eq!(parse_hex(&render_hex(sample)).unwrap(), sample);
        }
    }
}
