//! Text decoding for received data

use super::render_hex;

/// Shown in place of received data that is not valid UTF-8
pub const DECODE_FAILURE_NOTICE: &str = "wrong format to decode, show hexstring instead:\n";

/// Decode received bytes as UTF-8, falling back to the notice plus a hex
/// rendering of the whole chunk.
pub fn decode_text(data: &[u8]) -> String {
    match std::str::from_utf8(data) {
        Ok(text) => text.to_string(),
        Err(e) => {
            tracing::debug!("Received data is not UTF-8 ({}), showing hex", e);
            let mut output = String::from(DECODE_FAILURE_NOTICE);
            output.push_str(&render_hex(data));
            output
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_utf8() {
        assert_eq!(decode_text(b"Hello"), "Hello");
        assert_eq!(decode_text("µs".as_bytes()), "µs");
    }

    #[test]
    fn test_truncated_multibyte_falls_back() {
        // first byte of a two-byte sequence with its continuation missing
        let decoded = decode_text(&[b'A', 0xC3]);
        assert!(decoded.starts_with(DECODE_FAILURE_NOTICE));
        assert!(decoded.ends_with("41 C3"));
    }
}
