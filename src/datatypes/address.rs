// ABOUTME: Destination address field of an SMS-SUBMIT in semi-octet representation
// ABOUTME: Sanitizes phone numbers, swaps digit pairs with F padding, and decodes the field back

use crate::codec::{CodecError, Encodable, from_hex};
use crate::datatypes::TypeOfAddress;
use bytes::{BufMut, BytesMut};
use std::fmt;

/// Longest address value allowed in TP-DA, in digits
pub const MAX_ADDRESS_DIGITS: usize = 20;

/// A phone number ready to be written as TP-Destination-Address.
///
/// Holds the bare digits plus the type of address derived from a leading `+`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Address {
    digits: String,
    type_of_address: TypeOfAddress,
}

impl Address {
    /// Build an address from user input.
    ///
    /// Everything except digits and `+` is dropped. A leading `+` selects the
    /// international type of address.
    pub fn new(number: &str) -> Result<Self, CodecError> {
        let sanitized: String = number
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '+')
            .collect();
        let digits: String = sanitized.chars().filter(char::is_ascii_digit).collect();

        if digits.is_empty() || digits.len() > MAX_ADDRESS_DIGITS {
            return Err(CodecError::InvalidPhoneNumber(number.to_string()));
        }

        Ok(Self {
            type_of_address: TypeOfAddress::for_number(&sanitized),
            digits,
        })
    }

    /// Digits without any `+`
    pub fn digits(&self) -> &str {
        &self.digits
    }

    pub fn type_of_address(&self) -> TypeOfAddress {
        self.type_of_address
    }

    /// Number as dialled: digits with a `+` prefix for international addresses
    pub fn number(&self) -> String {
        match self.type_of_address {
            TypeOfAddress::International => format!("+{}", self.digits),
            TypeOfAddress::Unknown => self.digits.clone(),
        }
    }

    /// Digits in pairs with the two digits of each pair swapped, padded with
    /// an `F` nibble when the count is odd.
    pub fn semi_octets(&self) -> Vec<u8> {
        self.digits
            .as_bytes()
            .chunks(2)
            .map(|pair| {
                let first = pair[0] - b'0';
                let second = pair.get(1).map(|d| d - b'0').unwrap_or(0x0F);
                (second << 4) | first
            })
            .collect()
    }

    /// Decode an address field (length, type of address, semi-octets) from hex.
    pub fn decode_hex(hex: &str) -> Result<Self, CodecError> {
        let octets = from_hex(hex)?;
        let (&length, rest) = octets.split_first().ok_or(CodecError::Incomplete)?;
        let (&toa, semi_octets) = rest.split_first().ok_or(CodecError::Incomplete)?;
        let type_of_address = TypeOfAddress::try_from(toa)
            .map_err(|_| CodecError::MalformedHex(hex.to_string()))?;

        let length = usize::from(length);
        if semi_octets.len() < length.div_ceil(2) {
            return Err(CodecError::Incomplete);
        }

        let digits = semi_octets
            .iter()
            .flat_map(|octet| [octet & 0x0F, octet >> 4])
            .take(length)
            .map(|nibble| match nibble {
                0..=9 => Ok(char::from(b'0' + nibble)),
                _ => Err(CodecError::MalformedHex(hex.to_string())),
            })
            .collect::<Result<String, _>>()?;

        Ok(Self {
            digits,
            type_of_address,
        })
    }
}

impl Encodable for Address {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        // Bounded by MAX_ADDRESS_DIGITS in new()
        buf.put_u8(self.digits.len() as u8);
        buf.put_u8(self.type_of_address as u8);
        buf.put_slice(&self.semi_octets());
        Ok(())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Encode a phone number as a hex destination-address field.
pub fn encode_phone_number(number: &str) -> Result<String, CodecError> {
    Address::new(number)?.to_hex()
}

/// Decode a hex destination-address field back to the dialled number.
pub fn decode_phone_digits(hex: &str) -> Result<String, CodecError> {
    Ok(Address::decode_hex(hex)?.number())
}
