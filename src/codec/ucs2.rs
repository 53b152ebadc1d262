// ABOUTME: UCS2 hex codec for SMS user data and +CMT sender/body fields
// ABOUTME: Encodes by code point with surrogate pairs; decoding is fail-soft and never errors

use super::CodecError;
use std::fmt::Write;

/// Maximum number of UTF-16 units decoded from a single field
pub const MAX_DECODED_UNITS: usize = 1000;

/// Encode text as 4-hex-digit UTF-16 code units.
///
/// Characters outside the Basic Multilingual Plane are written as their high
/// and low surrogates, two groups per character.
///
/// ```
/// use sim800::codec::ucs2;
///
/// assert_eq!(ucs2::encode("Hi"), "00480069");
/// assert_eq!(ucs2::encode("😀"), "D83DDE00");
/// ```
pub fn encode(text: &str) -> String {
    let mut hex = String::with_capacity(text.len() * 4);
    for c in text.chars() {
        let mut units = [0u16; 2];
        for unit in c.encode_utf16(&mut units) {
            // Writing into a String cannot fail
            let _ = write!(hex, "{unit:04X}");
        }
    }
    hex
}

/// Byte length of the UCS2 encoding of `text`.
pub fn encoded_len(text: &str) -> usize {
    text.encode_utf16().count() * 2
}

/// Decode UCS2 hex back to text.
///
/// Non-hex characters are skipped, a trailing partial group is dropped and at
/// most [`MAX_DECODED_UNITS`] groups are read. A high surrogate followed by a
/// low surrogate becomes one character; unpaired surrogates become U+FFFD. The
/// result is trimmed. If decoding fails the input is returned unchanged.
pub fn decode(hex: &str) -> String {
    try_decode(hex).unwrap_or_else(|_| hex.to_string())
}

fn try_decode(hex: &str) -> Result<String, CodecError> {
    let digits: Vec<u8> = hex.bytes().filter(u8::is_ascii_hexdigit).collect();

    let units = digits
        .chunks_exact(4)
        .take(MAX_DECODED_UNITS)
        .map(|group| {
            let group =
                std::str::from_utf8(group).map_err(|_| CodecError::MalformedHex(hex.to_string()))?;
            u16::from_str_radix(group, 16).map_err(|_| CodecError::MalformedHex(hex.to_string()))
        })
        .collect::<Result<Vec<u16>, _>>()?;

    let text: String = char::decode_utf16(units)
        .map(|unit| unit.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect();

    Ok(text.trim().to_string())
}

/// True when `text` has the shape of UCS2 hex: non-empty, a multiple of four
/// characters long and made only of hex digits.
pub fn looks_like_hex(text: &str) -> bool {
    !text.is_empty() && text.len() % 4 == 0 && text.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Decode `text` if it looks like UCS2 hex, otherwise return it unchanged.
pub fn decode_if_hex(text: &str) -> String {
    if looks_like_hex(text) {
        decode(text)
    } else {
        text.to_string()
    }
}

/// Leave ASCII text alone, UCS2-encode anything else.
pub fn encode_if_needed(text: &str) -> String {
    if super::is_ascii(text) {
        text.to_string()
    } else {
        encode(text)
    }
}
