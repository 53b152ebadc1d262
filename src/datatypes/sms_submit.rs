// ABOUTME: SMS-SUBMIT PDU builder producing the hex string and TPDU length for AT+CMGS in PDU mode
// ABOUTME: Chooses GSM 7-bit or UCS2 user data from the message text and lays out every TPDU field

use crate::codec::{CodecError, Encodable, MAX_USER_DATA_OCTETS, gsm7, to_hex, ucs2};
use crate::datatypes::{Address, DataCoding};
use bytes::{BufMut, BytesMut};

/// SMSC length octet: zero means use the SMSC stored in the modem
pub const SMSC_DEFAULT: u8 = 0x00;
/// First TPDU octet: SMS-SUBMIT (MTI = 01) with a relative validity period (VPF = 10)
pub const PDU_TYPE_SUBMIT: u8 = 0x11;
/// Message reference, zero lets the modem assign one
pub const MESSAGE_REFERENCE: u8 = 0x00;
/// Plain short message protocol identifier
pub const PROTOCOL_ID: u8 = 0x00;
/// Relative validity period, maximum (63 weeks)
pub const VALIDITY_PERIOD_MAX: u8 = 0xFF;

/// An outgoing SMS-SUBMIT
///
/// Fully determined by the destination and the text; the encoding of the
/// user data follows [`DataCoding::for_text`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SmsSubmit {
    pub destination: Address,
    pub data_coding: DataCoding,
    pub text: String,
}

/// Hex form of a PDU plus the TPDU length expected by `AT+CMGS=<length>`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedPdu {
    pub hex: String,
    pub tpdu_length: usize,
}

impl SmsSubmit {
    /// Build a submit PDU for `text` to `phone_number`.
    pub fn new(phone_number: &str, text: &str) -> Result<Self, CodecError> {
        let destination = Address::new(phone_number)?;
        if text.is_empty() {
            return Err(CodecError::EmptyMessage);
        }

        let data_coding = DataCoding::for_text(text);
        data_coding
            .check_length(text)
            .map_err(|(length, max)| CodecError::MessageTooLong { length, max })?;

        Ok(Self {
            destination,
            data_coding,
            text: text.to_string(),
        })
    }

    /// TP-UDL: septet count for 7-bit text, octet count for UCS2
    pub fn user_data_length(&self) -> usize {
        match self.data_coding {
            DataCoding::Gsm7 => self.text.chars().count(),
            DataCoding::Ucs2 => ucs2::encoded_len(&self.text),
        }
    }

    fn user_data(&self) -> Vec<u8> {
        match self.data_coding {
            DataCoding::Gsm7 => gsm7::pack(&self.text),
            DataCoding::Ucs2 => self.text.encode_utf16().flat_map(u16::to_be_bytes).collect(),
        }
    }

    /// Encode to the hex string and TPDU length used on the wire.
    pub fn to_pdu(&self) -> Result<EncodedPdu, CodecError> {
        let mut buf = BytesMut::new();
        self.encode(&mut buf)?;
        let hex = to_hex(&buf);
        // Everything but the leading SMSC octet
        let tpdu_length = (hex.len() - 2) / 2;
        Ok(EncodedPdu { hex, tpdu_length })
    }
}

impl Encodable for SmsSubmit {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        let user_data = self.user_data();
        if user_data.len() > MAX_USER_DATA_OCTETS {
            return Err(CodecError::MessageTooLong {
                length: self.text.chars().count(),
                max: self.data_coding.max_single_sms_length(),
            });
        }

        buf.put_u8(SMSC_DEFAULT);
        buf.put_u8(PDU_TYPE_SUBMIT);
        buf.put_u8(MESSAGE_REFERENCE);
        self.destination.encode(buf)?;
        buf.put_u8(PROTOCOL_ID);
        buf.put_u8(self.data_coding.to_byte());
        buf.put_u8(VALIDITY_PERIOD_MAX);
        // Bounded by MAX_USER_DATA_OCTETS (or 160 septets) above
        buf.put_u8(self.user_data_length() as u8);
        buf.put_slice(&user_data);
        Ok(())
    }
}

/// Build the PDU hex and TPDU length for sending `message` to `phone_number`.
///
/// ```
/// use sim800::datatypes::encode_pdu;
///
/// let pdu = encode_pdu("1234", "A").unwrap();
/// assert_eq!(pdu.hex, "001100048121430000FF0141");
/// assert_eq!(pdu.tpdu_length, 11);
/// ```
pub fn encode_pdu(phone_number: &str, message: &str) -> Result<EncodedPdu, CodecError> {
    SmsSubmit::new(phone_number, message)?.to_pdu()
}
