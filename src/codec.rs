// ABOUTME: Text codecs used on the modem wire: GSM 7-bit septet packing and UCS2 hex
// ABOUTME: Also hosts the Encodable trait and hex rendering shared by the PDU datatypes

use bytes::BytesMut;
use thiserror::Error;

pub mod gsm7;
pub mod ucs2;

/// Longest user data a single SMS-SUBMIT can carry, in octets
pub const MAX_USER_DATA_OCTETS: usize = 140;

/// Errors raised while building PDUs or decoding wire encodings
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Phone number had no digits left after sanitization
    #[error("Invalid phone number: {0:?}")]
    InvalidPhoneNumber(String),

    /// Message text was empty
    #[error("Message cannot be empty")]
    EmptyMessage,

    /// Message does not fit a single SMS with the selected coding
    #[error("Message too long: {length} characters, max {max}")]
    MessageTooLong { length: usize, max: usize },

    /// Hex input had an odd number of digits or non-hex characters
    #[error("Malformed hex: {0:?}")]
    MalformedHex(String),

    /// Input ended before a field could be read
    #[error("Incomplete data")]
    Incomplete,
}

/// Trait for wire structures that serialize to raw octets
pub trait Encodable {
    /// Encode this structure to the buffer
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError>;

    /// Calculate the encoded size without keeping the encoding
    fn encoded_size(&self) -> usize {
        let mut buf = BytesMut::new();
        self.encode(&mut buf).map(|_| buf.len()).unwrap_or(0)
    }

    /// Encode and render as upper-case hex, the form AT+CMGS expects in PDU mode
    fn to_hex(&self) -> Result<String, CodecError> {
        let mut buf = BytesMut::new();
        self.encode(&mut buf)?;
        Ok(to_hex(&buf))
    }
}

/// Render octets as upper-case hex pairs.
pub fn to_hex(octets: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(octets.len() * 2);
    for octet in octets {
        // Writing into a String cannot fail
        let _ = write!(out, "{octet:02X}");
    }
    out
}

/// Parse hex pairs back into octets.
pub fn from_hex(hex: &str) -> Result<Vec<u8>, CodecError> {
    if hex.len() % 2 != 0 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(CodecError::MalformedHex(hex.to_string()));
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| CodecError::MalformedHex(hex.to_string()))
        })
        .collect()
}

/// True when every character fits in 7-bit ASCII.
pub fn is_ascii(text: &str) -> bool {
    text.chars().all(|c| (c as u32) <= 0x7F)
}
