// ABOUTME: Core modem client traits using native async functions
// ABOUTME: Splits connection management, SMS sending and SMS receiving into layered interfaces

use crate::client::error::ModemResult;
use crate::client::types::InboundSms;

/// Connection lifecycle of a modem client
pub trait ModemConnection {
    /// Open the serial port and initialize the modem
    ///
    /// Succeeds only when the port opened and the modem answered `AT` with
    /// `OK`. Text mode, the GSM character set and direct delivery of new
    /// messages are then configured on a best-effort basis and the
    /// background reader is started.
    async fn connect(&mut self, port_name: &str) -> ModemResult<()>;

    /// Stop the reader and close the port
    ///
    /// Calling it on a disconnected client does nothing.
    async fn disconnect(&mut self) -> ModemResult<()>;

    /// Check if the modem is connected and initialized
    fn is_connected(&self) -> bool;

    /// Send `AT` and report whether the modem answered `OK`
    async fn test_connection(&self) -> bool;
}

/// SMS sending operations
pub trait SmsTransmitter: ModemConnection {
    /// Send a single-segment SMS
    ///
    /// Pure ASCII text goes out in text mode (up to 160 characters), anything
    /// else as a UCS2 PDU (up to 70 characters). Requests are validated
    /// before anything is written to the modem.
    async fn send_sms(&self, phone_number: &str, message: &str) -> ModemResult<()>;
}

/// SMS receiving operations
///
/// Messages arrive as `+CMT:` notifications and are delivered from the
/// background reader task.
pub trait SmsReceiver: ModemConnection {
    /// Register the callback invoked for each inbound SMS, replacing any
    /// previous one
    fn set_inbound_handler<F>(&self, handler: F)
    where
        F: Fn(InboundSms) + Send + Sync + 'static;

    /// Remove the inbound callback; messages are then only logged
    fn clear_inbound_handler(&self);
}

/// Combined send and receive capabilities
pub trait SmsTransceiver: SmsTransmitter + SmsReceiver {}

impl<T> SmsTransceiver for T where T: SmsTransmitter + SmsReceiver {}
