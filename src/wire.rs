//! CC frame wire codec
//!
//! One frame = one control-change update: a control identifier (`cc`) plus its
//! new value, both 7-bit. Two encodings exist on the wire:
//!
//! - Binary (canonical): exactly 2 bytes, `[cc, value]`. This is what the
//!   bridge parses and what the hub fans out.
//! - Text (accepted): a JSON two-element array `[value, cc]`, for clients that
//!   can only send text WebSocket frames.

use thiserror::Error;

/// Errors produced while decoding a frame from the wire
#[derive(Debug, Error)]
pub enum WireError {
    #[error("binary frame too short: expected 2 bytes, got {0}")]
    Truncated(usize),

    #[error("malformed text frame: {0}")]
    MalformedText(#[from] serde_json::Error),

    #[error("text frame is not a two-element array")]
    BadShape,

    #[error("text frame field out of range: {0}")]
    OutOfRange(i64),
}

/// A single control-change update
///
/// Both fields are clamped to 7 bits at construction, so a frame that exists
/// is always valid to put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CcFrame {
    pub cc: u8,
    pub value: u8,
}

impl CcFrame {
    /// Create a frame, masking both fields to the MIDI 7-bit range
    pub fn new(cc: u8, value: u8) -> Self {
        Self {
            cc: cc & 0x7F,
            value: value & 0x7F,
        }
    }

    /// Encode as the canonical 2-byte binary form `[cc, value]`
    pub fn encode(&self) -> [u8; 2] {
        [self.cc, self.value]
    }

    /// Decode from the binary form; extra trailing bytes are ignored
    pub fn parse(data: &[u8]) -> Result<Self, WireError> {
        if data.len() < 2 {
            return Err(WireError::Truncated(data.len()));
        }
        Ok(Self::new(data[0], data[1]))
    }

    /// Encode as the JSON text form `[value, cc]`
    pub fn encode_text(&self) -> String {
        format!("[{},{}]", self.value, self.cc)
    }

    /// Decode from the JSON text form `[value, cc]`
    pub fn parse_text(text: &str) -> Result<Self, WireError> {
        let fields: Vec<i64> = serde_json::from_str(text)?;
        if fields.len() != 2 {
            return Err(WireError::BadShape);
        }
        let (value, cc) = (fields[0], fields[1]);
        for &field in &[value, cc] {
            if !(0..=127).contains(&field) {
                return Err(WireError::OutOfRange(field));
            }
        }
        Ok(Self::new(cc as u8, value as u8))
    }
}

impl std::fmt::Display for CcFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CC{}={}", self.cc, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_binary_encoding_exact() {
        // cc=2, value=64 must be exactly [0x02, 0x40]
        let frame = CcFrame::new(2, 64);
        assert_eq!(frame.encode(), [0x02, 0x40]);
    }

    #[test]
    fn test_text_encoding_exact() {
        // text form is [value, cc]
        let frame = CcFrame::new(2, 64);
        assert_eq!(frame.encode_text(), "[64,2]");
    }

    #[test]
    fn test_parse_binary() {
        let frame = CcFrame::parse(&[0x02, 0x40]).unwrap();
        assert_eq!(frame, CcFrame::new(2, 64));
    }

    #[test]
    fn test_parse_binary_ignores_trailing() {
        let frame = CcFrame::parse(&[7, 100, 0xFF]).unwrap();
        assert_eq!(frame, CcFrame { cc: 7, value: 100 });
    }

    #[test]
    fn test_parse_truncated() {
        assert!(matches!(
            CcFrame::parse(&[0x02]),
            Err(WireError::Truncated(1))
        ));
        assert!(matches!(CcFrame::parse(&[]), Err(WireError::Truncated(0))));
    }

    #[test]
    fn test_parse_text() {
        let frame = CcFrame::parse_text("[64, 2]").unwrap();
        assert_eq!(frame, CcFrame::new(2, 64));
    }

    #[test]
    fn test_parse_text_rejects_bad_shape() {
        assert!(CcFrame::parse_text("[64]").is_err());
        assert!(CcFrame::parse_text("[64, 2, 3]").is_err());
        assert!(CcFrame::parse_text("{\"cc\": 2}").is_err());
        assert!(CcFrame::parse_text("knob").is_err());
    }

    #[test]
    fn test_parse_text_rejects_out_of_range() {
        assert!(matches!(
            CcFrame::parse_text("[128, 2]"),
            Err(WireError::OutOfRange(128))
        ));
        assert!(matches!(
            CcFrame::parse_text("[64, -1]"),
            Err(WireError::OutOfRange(-1))
        ));
    }

    proptest! {
        #[test]
        fn frame_fields_always_seven_bit(cc: u8, value: u8) {
            let frame = CcFrame::new(cc, value);
            prop_assert!(frame.cc <= 127);
            prop_assert!(frame.value <= 127);
        }

        #[test]
        fn binary_and_text_forms_agree(cc in 0u8..=127, value in 0u8..=127) {
            let frame = CcFrame::new(cc, value);
            let from_binary = CcFrame::parse(&frame.encode()).unwrap();
            let from_text = CcFrame::parse_text(&frame.encode_text()).unwrap();
            prop_assert_eq!(from_binary, from_text);
        }
    }
}
