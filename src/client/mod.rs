// ABOUTME: Modem client module providing trait-based interfaces for sending and receiving SMS
// ABOUTME: Exports all client components including traits, builders, error types, and default implementation

//! SIM800 Client Module
//!
//! * **Native async traits** - Uses async fn in traits (no async_trait dependency)
//! * **Layered design** - Separate traits for connection, sending and receiving
//! * **Automatic encoding** - ASCII goes out in text mode, everything else as a UCS2 PDU
//! * **Background reader** - Inbound `+CMT:` notifications are delivered to a callback
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sim800::client::{ModemBuilder, ModemConnection, SmsTransmitter};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut modem = ModemBuilder::new()
//!     .on_message(|sms| println!("From {}: {}", sms.sender, sms.body))
//!     .connect("/dev/ttyUSB0")
//!     .await?;
//!
//! modem.send_sms("+1234567890", "Hello!").await?;
//! modem.send_sms("+989123456789", "سلام").await?;
//!
//! modem.disconnect().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! * `ModemConnection` - Port lifecycle, AT initialization and link test
//! * `SmsTransmitter` - SMS sending (extends ModemConnection)
//! * `SmsReceiver` - Inbound SMS callback registration (extends ModemConnection)
//! * `SmsTransceiver` - Combined send and receive (extends both)

pub mod builder;
pub mod default;
pub mod error;
pub mod traits;
pub mod types;

pub use builder::{ModemBuilder, ModemOptions, Timeouts};
pub use default::SmsModem;
pub use error::{ModemError, ModemResult};
pub use traits::{ModemConnection, SmsReceiver, SmsTransceiver, SmsTransmitter};
pub use types::{InboundSms, LinkState, OutgoingSms, ValidationError, sanitize_phone_number};
