// ABOUTME: Modem client options and builder for configuring timeouts, serial settings and handlers
// ABOUTME: Provides convenient constructors that connect over a serial port or any async transport

use crate::client::default::SmsModem;
use crate::client::error::ModemResult;
use crate::client::traits::ModemConnection;
use crate::client::types::InboundSms;
use crate::connection::{SerialSettings, Transport};
use crate::log::DEFAULT_LOG_CAPACITY;
use std::time::Duration;

/// Timeouts applied to modem exchanges
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeouts {
    /// Configuration and mode-switch commands (default: 2 seconds)
    pub command: Duration,
    /// `AT` sent by `test_connection` (default: 3 seconds)
    pub test: Duration,
    /// Wait for the `>` prompt after `AT+CMGS` (default: 5 seconds)
    pub prompt: Duration,
    /// Wait for the network to accept a submitted message (default: 30 seconds)
    pub submit: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            command: Duration::from_secs(2),
            test: Duration::from_secs(3),
            prompt: Duration::from_secs(5),
            submit: Duration::from_secs(30),
        }
    }
}

/// Options for a modem client
///
/// # Example
///
/// ```rust
/// use sim800::client::{ModemOptions, Timeouts};
/// use std::time::Duration;
///
/// let options = ModemOptions::default()
///     .with_startup_delay(Duration::from_millis(500))
///     .with_timeouts(Timeouts {
///         submit: Duration::from_secs(60),
///         ..Timeouts::default()
///     })
///     .with_log_capacity(200);
/// assert_eq!(options.log_capacity, 200);
/// ```
#[derive(Debug, Clone)]
pub struct ModemOptions {
    /// Serial line parameters (default: 9600-8-N-1, 1 s read timeout)
    pub serial: SerialSettings,
    pub timeouts: Timeouts,
    /// Longest single read of the background reader (default: 100 ms)
    ///
    /// Commands wait at most this long for the reader to hand over the link.
    pub reader_poll_interval: Duration,
    /// Pause after opening the port before the first `AT` (default: 1 second)
    pub startup_delay: Duration,
    /// Pause after ESC when aborting message input (default: 500 ms)
    pub abort_settle: Duration,
    /// How long disconnect waits for the reader before aborting it (default: 1 second)
    pub reader_join_timeout: Duration,
    /// Diagnostic log entries kept (default: 1000)
    pub log_capacity: usize,
}

impl Default for ModemOptions {
    fn default() -> Self {
        Self {
            serial: SerialSettings::default(),
            timeouts: Timeouts::default(),
            reader_poll_interval: Duration::from_millis(100),
            startup_delay: Duration::from_secs(1),
            abort_settle: Duration::from_millis(500),
            reader_join_timeout: Duration::from_secs(1),
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

impl ModemOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_serial(mut self, serial: SerialSettings) -> Self {
        self.serial = serial;
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_reader_poll_interval(mut self, interval: Duration) -> Self {
        self.reader_poll_interval = interval;
        self
    }

    pub fn with_startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = delay;
        self
    }

    pub fn with_abort_settle(mut self, delay: Duration) -> Self {
        self.abort_settle = delay;
        self
    }

    pub fn with_reader_join_timeout(mut self, timeout: Duration) -> Self {
        self.reader_join_timeout = timeout;
        self
    }

    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity;
        self
    }
}

/// Builder for connected modem clients
///
/// ```rust,no_run
/// use sim800::client::{ModemBuilder, SmsTransmitter};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let modem = ModemBuilder::new()
///     .on_message(|sms| println!("{}: {}", sms.sender, sms.body))
///     .connect("/dev/ttyUSB0")
///     .await?;
/// modem.send_sms("+1234567890", "Hello!").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct ModemBuilder {
    options: ModemOptions,
    handler: Option<Box<dyn Fn(InboundSms) + Send + Sync>>,
}

impl ModemBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn options(mut self, options: ModemOptions) -> Self {
        self.options = options;
        self
    }

    /// Register the callback for inbound SMS before the reader starts.
    pub fn on_message<F>(mut self, handler: F) -> Self
    where
        F: Fn(InboundSms) + Send + Sync + 'static,
    {
        self.handler = Some(Box::new(handler));
        self
    }

    /// Create the client without connecting.
    pub fn build(self) -> SmsModem {
        let modem = SmsModem::with_options(self.options);
        if let Some(handler) = self.handler {
            modem.set_boxed_handler(handler);
        }
        modem
    }

    /// Open `port_name`, initialize the modem and start the reader.
    pub async fn connect(self, port_name: &str) -> ModemResult<SmsModem> {
        let mut modem = self.build();
        modem.connect(port_name).await?;
        Ok(modem)
    }

    /// Initialize a modem reachable through `transport` and start the reader.
    pub async fn connect_transport<T>(self, transport: T) -> ModemResult<SmsModem>
    where
        T: Transport + 'static,
    {
        let mut modem = self.build();
        modem.connect_transport(transport).await?;
        Ok(modem)
    }
}
