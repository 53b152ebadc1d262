//! SMS over a SIM800-class GSM modem on a serial link
//!
//! The crate has two layers:
//!
//! * the AT command protocol: a [`channel::CommandChannel`] that gives one
//!   exchange at a time exclusive use of the serial connection, and a
//!   [`reader`] task that picks up unsolicited `+CMT:` notifications between
//!   exchanges;
//! * the codecs needed to send non-ASCII text: GSM 7-bit packing, UCS2 hex
//!   and SMS-SUBMIT PDU construction.
//!
//! # Example
//!
//! ```rust,no_run
//! use sim800::{ModemBuilder, ModemConnection, SmsTransmitter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut modem = ModemBuilder::new().connect("/dev/ttyUSB0").await?;
//!
//!     if modem.test_connection().await {
//!         modem.send_sms("+1234567890", "Hello, World!").await?;
//!     }
//!
//!     print!("{}", modem.logs());
//!     modem.disconnect().await?;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod client;
pub mod codec;
pub mod connection;
pub mod datatypes;
pub mod frame;
pub mod log;
pub mod reader;

#[cfg(test)]
mod tests;

// Re-export codec types for direct access
pub use codec::{CodecError, Encodable};
pub use datatypes::{EncodedPdu, encode_pdu};

// Re-export the main client API for easy access
pub use client::{
    InboundSms, ModemBuilder, ModemConnection, ModemError, ModemOptions, ModemResult, SmsModem,
    SmsReceiver, SmsTransmitter,
};
