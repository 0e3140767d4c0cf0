//! Streaming UTF-8 decoding of response bodies.

const BOM: char = '\u{feff}';

/// Incremental UTF-8 decoder.
///
/// Multi-byte sequences split across chunks are held back until complete.
/// Invalid sequences become U+FFFD. A byte-order mark at the very start of
/// the body is dropped.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    /// Bytes of an incomplete sequence at the end of the previous chunk.
    pending: Vec<u8>,
    bom_checked: bool,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `bytes`, returning everything that could be decoded so far.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let joined;
        let mut input = if self.pending.is_empty() {
            bytes
        } else {
            self.pending.extend_from_slice(bytes);
            joined = std::mem::take(&mut self.pending);
            joined.as_slice()
        };

        let mut out = String::with_capacity(input.len());
        loop {
            match std::str::from_utf8(input) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(err) => {
                    let (valid, rest) = input.split_at(err.valid_up_to());
                    // `valid_up_to` marks a UTF-8 prefix.
                    out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match err.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            input = &rest[len..];
                        }
                        None => {
                            // Truncated sequence: wait for more bytes.
                            self.pending.extend_from_slice(rest);
                            break;
                        }
                    }
                }
            }
        }

        self.strip_bom(out)
    }

    /// Finish the body. A sequence still incomplete becomes U+FFFD.
    pub fn flush(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        self.pending.clear();
        self.strip_bom(char::REPLACEMENT_CHARACTER.to_string())
    }

    fn strip_bom(&mut self, text: String) -> String {
        if self.bom_checked || text.is_empty() {
            return text;
        }
        self.bom_checked = true;
        match text.strip_prefix(BOM) {
            Some(rest) => rest.to_string(),
            None => text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passthrough() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"data: hi\n\n"), "data: hi\n\n");
        assert_eq!(decoder.flush(), "");
    }

    #[test]
    fn test_split_multibyte_sequence() {
        let bytes = "é✓".as_bytes();
        let mut decoder = Utf8Decoder::new();
        let mut out = String::new();
        for byte in bytes {
            out.push_str(&decoder.decode(std::slice::from_ref(byte)));
        }
        assert_eq!(out, "é✓");
        assert_eq!(decoder.flush(), "");
    }

    #[test]
    fn test_invalid_bytes_are_replaced() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"a\xffb"), "a\u{fffd}b");
    }

    #[test]
    fn test_truncated_tail_flushes_as_replacement() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"ok\xe2\x9c"), "ok");
        assert_eq!(decoder.flush(), "\u{fffd}");
    }

    #[test]
    fn test_leading_bom_is_stripped_once() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"\xef\xbb"), "");
        assert_eq!(decoder.decode(b"\xbfdata"), "data");
        assert_eq!(decoder.decode("\u{feff}x".as_bytes()), "\u{feff}x");
    }
}
