// ABOUTME: Supporting types for modem client operations: outgoing SMS validation and inbound messages
// ABOUTME: Also tracks the link state machine shared between the client and its background reader

use crate::codec::is_ascii;
use crate::datatypes::DataCoding;
use num_enum::TryFromPrimitive;
use std::sync::atomic::{AtomicU8, Ordering};
use thiserror::Error;

/// Reasons a send request is refused before anything is written to the modem
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Phone number cannot be empty")]
    EmptyPhoneNumber,

    #[error("Invalid phone number format: {0:?}")]
    InvalidPhoneNumber(String),

    #[error("Message cannot be empty")]
    EmptyMessage,

    #[error("Message contains invalid control characters")]
    ControlCharacters,

    #[error("Message too long. Max {max} characters for {charset} messages. Current: {length}")]
    MessageTooLong {
        length: usize,
        max: usize,
        charset: &'static str,
    },
}

/// An SMS received from the network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundSms {
    /// Originating address, UCS2-decoded when the modem reported it as hex
    pub sender: String,
    /// Message text, UCS2-decoded when the modem reported it as hex
    pub body: String,
}

/// A validated outgoing SMS
///
/// The phone number keeps only digits, `+`, `-`, parentheses and spaces.
/// For GSM 7-bit messages CR and LF are replaced by spaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingSms {
    pub phone_number: String,
    pub text: String,
    pub data_coding: DataCoding,
}

impl OutgoingSms {
    pub fn new(phone_number: &str, message: &str) -> Result<Self, ValidationError> {
        if phone_number.is_empty() {
            return Err(ValidationError::EmptyPhoneNumber);
        }
        let phone = sanitize_phone_number(phone_number);
        if phone.is_empty() {
            return Err(ValidationError::InvalidPhoneNumber(phone_number.to_string()));
        }

        if message.is_empty() {
            return Err(ValidationError::EmptyMessage);
        }

        let data_coding = DataCoding::for_text(message);
        data_coding
            .check_length(message)
            .map_err(|(length, max)| ValidationError::MessageTooLong {
                length,
                max,
                charset: if is_ascii(message) { "English" } else { "Unicode" },
            })?;

        let text = match data_coding {
            DataCoding::Gsm7 => sanitize_text_body(message)?,
            DataCoding::Ucs2 => message.to_string(),
        };

        Ok(Self {
            phone_number: phone,
            text,
            data_coding,
        })
    }

    /// True when the message must go out in PDU mode
    pub fn needs_pdu_mode(&self) -> bool {
        self.data_coding.is_unicode()
    }
}

/// Keep digits, `+`, `-`, parentheses and spaces.
pub fn sanitize_phone_number(phone_number: &str) -> String {
    phone_number
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '(' | ')' | ' '))
        .collect()
}

/// Refuse Ctrl+Z and ESC, which end or cancel message input, and flatten
/// CR/LF to spaces.
fn sanitize_text_body(message: &str) -> Result<String, ValidationError> {
    if message.contains(['\u{1A}', '\u{1B}']) {
        return Err(ValidationError::ControlCharacters);
    }
    Ok(message.replace(['\r', '\n'], " "))
}

/// Link state of a modem client
#[derive(TryFromPrimitive, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum LinkState {
    #[default]
    Disconnected = 0,
    /// Serial port being opened
    Opening = 1,
    /// Port open, AT initialization in progress
    Initializing = 2,
    /// Initialized and reader running
    Connected = 3,
}

/// Atomic cell holding a [`LinkState`]
#[derive(Debug, Default)]
pub struct AtomicLinkState(AtomicU8);

impl AtomicLinkState {
    pub fn new(state: LinkState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> LinkState {
        LinkState::try_from(self.0.load(Ordering::Acquire)).unwrap_or_default()
    }

    pub fn store(&self, state: LinkState) {
        self.0.store(state as u8, Ordering::Release);
    }
}
