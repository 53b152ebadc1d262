// ABOUTME: Data coding scheme byte for SMS-SUBMIT user data (GSM 7-bit or UCS2)
// ABOUTME: Picks the coding for a message and knows the single-segment length limit of each

use num_enum::TryFromPrimitive;
use std::fmt;

/// Data coding scheme written in the TP-DCS field
#[derive(TryFromPrimitive, Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
#[repr(u8)]
pub enum DataCoding {
    /// GSM 7-bit default alphabet, used for pure ASCII text
    #[default]
    Gsm7 = 0x00,
    /// UCS2 (16-bit), used as soon as any character is above U+007F
    Ucs2 = 0x08,
}

impl DataCoding {
    /// Select the coding for `text`: GSM 7-bit when every character is ASCII,
    /// UCS2 otherwise.
    pub fn for_text(text: &str) -> Self {
        if crate::codec::is_ascii(text) {
            DataCoding::Gsm7
        } else {
            DataCoding::Ucs2
        }
    }

    /// Returns the raw u8 value for the wire
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Maximum number of characters (code points) in one SMS with this coding
    pub fn max_single_sms_length(self) -> usize {
        match self {
            DataCoding::Gsm7 => 160,
            DataCoding::Ucs2 => 70,
        }
    }

    pub fn is_unicode(self) -> bool {
        matches!(self, DataCoding::Ucs2)
    }

    /// Human readable name, used in validation errors and logs
    pub fn charset_name(self) -> &'static str {
        match self {
            DataCoding::Gsm7 => "GSM 7-bit",
            DataCoding::Ucs2 => "UCS-2",
        }
    }

    /// Check that `text` fits one SMS with this coding.
    ///
    /// Length is counted in code points, so an emoji counts as one character.
    pub fn check_length(self, text: &str) -> Result<usize, (usize, usize)> {
        let length = text.chars().count();
        let max = self.max_single_sms_length();
        if length > max {
            Err((length, max))
        } else {
            Ok(length)
        }
    }
}

impl fmt::Display for DataCoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.charset_name())
    }
}

impl From<DataCoding> for u8 {
    fn from(data_coding: DataCoding) -> Self {
        data_coding.to_byte()
    }
}
