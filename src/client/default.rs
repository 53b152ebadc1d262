// ABOUTME: Default modem client implementing connection management, SMS sending and receiving
// ABOUTME: Drives the AT initialization sequence and the text-mode and PDU-mode submission flows

use crate::channel::{CTRL_Z, CommandChannel, Exchange, ExchangeOutcome, OK_TOKEN};
use crate::client::builder::{ModemOptions, Timeouts};
use crate::client::error::{ModemError, ModemResult};
use crate::client::traits::{ModemConnection, SmsReceiver, SmsTransmitter};
use crate::client::types::{AtomicLinkState, InboundSms, LinkState, OutgoingSms};
use crate::connection::{Connection, Transport};
use crate::datatypes::{EncodedPdu, encode_pdu};
use crate::log::DiagnosticLog;
use crate::reader::{InboundHandler, Reader, ReaderHandle, SharedHandler};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

const HANDSHAKE: &str = "AT";
const TEXT_MODE: &str = "AT+CMGF=1";
const PDU_MODE: &str = "AT+CMGF=0";
const GSM_CHARSET: &str = "AT+CSCS=\"GSM\"";
const NEW_MESSAGE_INDICATION: &str = "AT+CNMI=2,2,0,0,0";

/// Best-effort configuration issued after the handshake
const INIT_SEQUENCE: [(&str, &str); 3] = [
    ("Setting text mode...", TEXT_MODE),
    ("Setting character set...", GSM_CHARSET),
    ("Configuring auto-receive...", NEW_MESSAGE_INDICATION),
];

/// Default modem client
///
/// Owns the command channel while connected and a background reader that
/// delivers inbound SMS to the registered handler.
pub struct SmsModem {
    options: ModemOptions,
    state: AtomicLinkState,
    log: DiagnosticLog,
    handler: SharedHandler,
    channel: Option<Arc<CommandChannel>>,
    reader: Option<ReaderHandle>,
}

impl Default for SmsModem {
    fn default() -> Self {
        Self::with_options(ModemOptions::default())
    }
}

impl Drop for SmsModem {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

impl SmsModem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ModemOptions) -> Self {
        Self {
            log: DiagnosticLog::new(options.log_capacity),
            options,
            state: AtomicLinkState::default(),
            handler: Arc::new(RwLock::new(None)),
            channel: None,
            reader: None,
        }
    }

    pub fn options(&self) -> &ModemOptions {
        &self.options
    }

    pub fn state(&self) -> LinkState {
        self.state.load()
    }

    /// Diagnostic log as text, one timestamped entry per line
    pub fn logs(&self) -> String {
        self.log.read()
    }

    pub fn clear_logs(&self) {
        self.log.clear();
    }

    /// Shared handle to the diagnostic log
    pub fn diagnostics(&self) -> &DiagnosticLog {
        &self.log
    }

    pub fn has_inbound_handler(&self) -> bool {
        self.handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub(crate) fn set_boxed_handler(&self, handler: Box<dyn Fn(InboundSms) + Send + Sync>) {
        self.replace_handler(Some(Arc::from(handler)));
    }

    fn replace_handler(&self, handler: Option<InboundHandler>) {
        *self.handler.write().unwrap_or_else(PoisonError::into_inner) = handler;
    }

    /// Initialize a modem reachable through `transport` instead of a serial
    /// port, then start the reader.
    pub async fn connect_transport<T>(&mut self, transport: T) -> ModemResult<()>
    where
        T: Transport + 'static,
    {
        self.ensure_disconnected()?;
        self.state.store(LinkState::Opening);
        self.initialize(Connection::new(transport, "transport")).await
    }

    fn ensure_disconnected(&self) -> ModemResult<()> {
        match self.state.load() {
            LinkState::Disconnected => Ok(()),
            state => Err(ModemError::InvalidState(format!(
                "Cannot connect while {state:?}"
            ))),
        }
    }

    async fn initialize(&mut self, connection: Connection) -> ModemResult<()> {
        self.state.store(LinkState::Initializing);
        debug!("Initializing modem on {}", connection.name());
        tokio::time::sleep(self.options.startup_delay).await;

        let channel = Arc::new(CommandChannel::new(
            connection,
            self.log.clone(),
            self.options.abort_settle,
        ));
        let timeout = self.options.timeouts.command;

        self.log.append("Initializing modem...");
        if !channel.send_command_await(HANDSHAKE, OK_TOKEN, timeout).await {
            self.log.append("Initialization failed");
            self.state.store(LinkState::Disconnected);
            drop(channel);
            self.log.append("Port closed");
            return Err(ModemError::Handshake);
        }

        for (step, command) in INIT_SEQUENCE {
            self.log.append(step);
            if !channel.send_command_await(command, OK_TOKEN, timeout).await {
                warn!("{} was not accepted, continuing", command);
            }
        }

        self.log.append("Starting reader...");
        let reader = Reader::new(
            Arc::clone(&channel),
            Arc::clone(&self.handler),
            self.options.reader_poll_interval,
        );
        self.reader = Some(reader.spawn());
        self.channel = Some(channel);
        self.state.store(LinkState::Connected);

        info!("Modem connected");
        self.log.append("Connected successfully!");
        Ok(())
    }

    fn channel(&self) -> ModemResult<&Arc<CommandChannel>> {
        if !self.is_connected() {
            return Err(ModemError::not_connected());
        }
        self.channel.as_ref().ok_or_else(ModemError::not_connected)
    }

    async fn send_text_mode(&self, channel: &CommandChannel, sms: &OutgoingSms) -> ModemResult<()> {
        let timeouts = &self.options.timeouts;
        let mut exchange = channel.exchange().await;

        let result = submit_text(&mut exchange, sms, timeouts, &self.log).await;

        match result {
            Ok(()) => {
                self.log.append("SMS sent successfully!");
                Ok(())
            }
            Err(e) => {
                self.log.append(format!("Error sending SMS: {e}"));
                abort(&mut exchange).await;
                Err(e)
            }
        }
    }

    async fn send_pdu_mode(&self, channel: &CommandChannel, sms: &OutgoingSms) -> ModemResult<()> {
        let timeouts = &self.options.timeouts;
        let pdu = encode_pdu(&sms.phone_number, &sms.text)?;
        self.log.append(format!("PDU: {}", pdu.hex));
        self.log.append(format!("TPDU Length: {}", pdu.tpdu_length));

        let mut exchange = channel.exchange().await;
        let result = submit_pdu(&mut exchange, &pdu, timeouts, &self.log).await;
        if let Err(e) = &result {
            self.log.append(format!("Error sending SMS via PDU: {e}"));
            abort(&mut exchange).await;
        }
        drop(exchange);

        // Inbound notifications are only parsed in text mode
        if !channel.send_command_await(TEXT_MODE, OK_TOKEN, timeouts.command).await {
            warn!("Could not switch back to text mode");
        }

        if result.is_ok() {
            self.log.append("SMS sent successfully via PDU mode!");
        }
        result
    }
}

/// Map the outcome of `command` to a result.
fn expect_ok(outcome: ExchangeOutcome, command: &str) -> ModemResult<()> {
    match outcome {
        ExchangeOutcome::Matched(_) => Ok(()),
        ExchangeOutcome::Rejected(response) => Err(ModemError::Protocol {
            command: command.to_string(),
            response: response.trim().to_string(),
        }),
        ExchangeOutcome::TimedOut(_) => Err(ModemError::Timeout {
            waiting_for: format!("{command} result"),
        }),
    }
}

/// `AT+CMGS`, prompt, body, Ctrl+Z, final result.
async fn submit(
    exchange: &mut Exchange<'_>,
    command: &str,
    body: &[u8],
    timeouts: &Timeouts,
    log: &DiagnosticLog,
) -> ModemResult<()> {
    exchange.send_command(command).await?;
    if !exchange.await_prompt(timeouts.prompt).await?.is_matched() {
        return Err(ModemError::NoPrompt);
    }

    log.append("Sending message body...");
    exchange.write_raw(body).await?;
    log.append("Sending Ctrl+Z...");
    exchange.write_raw(&[CTRL_Z]).await?;

    let outcome = exchange.await_token(OK_TOKEN, timeouts.submit).await?;
    expect_ok(outcome, command)
}

async fn submit_text(
    exchange: &mut Exchange<'_>,
    sms: &OutgoingSms,
    timeouts: &Timeouts,
    log: &DiagnosticLog,
) -> ModemResult<()> {
    let outcome = exchange.command(GSM_CHARSET, OK_TOKEN, timeouts.command).await?;
    expect_ok(outcome, GSM_CHARSET)?;

    let command = format!("AT+CMGS=\"{}\"", sms.phone_number);
    submit(exchange, &command, sms.text.as_bytes(), timeouts, log).await
}

async fn submit_pdu(
    exchange: &mut Exchange<'_>,
    pdu: &EncodedPdu,
    timeouts: &Timeouts,
    log: &DiagnosticLog,
) -> ModemResult<()> {
    let outcome = exchange.command(PDU_MODE, OK_TOKEN, timeouts.command).await?;
    expect_ok(outcome, PDU_MODE)?;

    let command = format!("AT+CMGS={}", pdu.tpdu_length);
    submit(exchange, &command, pdu.hex.as_bytes(), timeouts, log).await
}

async fn abort(exchange: &mut Exchange<'_>) {
    if let Err(e) = exchange.abort().await {
        warn!("Abort failed: {}", e);
    }
}

impl ModemConnection for SmsModem {
    async fn connect(&mut self, port_name: &str) -> ModemResult<()> {
        if port_name.is_empty() {
            self.log.append("Connect failed: No port specified");
            return Err(ModemError::PortOpen {
                port: String::new(),
                reason: "no port specified".to_string(),
            });
        }
        self.ensure_disconnected()?;

        self.log.append(format!("Connecting to: {port_name}"));
        self.state.store(LinkState::Opening);
        let connection = match Connection::open(port_name, &self.options.serial) {
            Ok(connection) => connection,
            Err(e) => {
                self.log.append(format!("Failed to open port: {port_name}"));
                self.state.store(LinkState::Disconnected);
                return Err(e);
            }
        };
        self.log.append("Port opened successfully");

        self.initialize(connection).await
    }

    async fn disconnect(&mut self) -> ModemResult<()> {
        if self.channel.is_none() && self.reader.is_none() {
            self.state.store(LinkState::Disconnected);
            return Ok(());
        }

        self.log.append("Disconnecting...");
        self.state.store(LinkState::Disconnected);
        if let Some(reader) = self.reader.take() {
            reader.stop(self.options.reader_join_timeout).await;
        }
        if self.channel.take().is_some() {
            self.log.append("Port closed");
        }
        info!("Modem disconnected");
        self.log.append("Disconnected");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.load() == LinkState::Connected && self.channel.is_some()
    }

    async fn test_connection(&self) -> bool {
        let Ok(channel) = self.channel() else {
            self.log.append("Test failed: Not connected");
            return false;
        };

        self.log.append("Testing connection...");
        match channel
            .execute(HANDSHAKE, OK_TOKEN, self.options.timeouts.test)
            .await
        {
            Ok(ExchangeOutcome::Matched(_)) => {
                self.log.append("Test successful!");
                true
            }
            Ok(ExchangeOutcome::Rejected(_)) => {
                self.log.append("Test failed: ERROR received");
                false
            }
            Ok(ExchangeOutcome::TimedOut(response)) => {
                self.log.append(format!(
                    "Test failed: Timeout (received: {})",
                    response.trim()
                ));
                false
            }
            Err(e) => {
                self.log.append(format!("Test failed: {e}"));
                false
            }
        }
    }
}

impl SmsTransmitter for SmsModem {
    async fn send_sms(&self, phone_number: &str, message: &str) -> ModemResult<()> {
        let channel = self.channel()?;
        let sms = OutgoingSms::new(phone_number, message)?;

        self.log.append(format!("Sending SMS to: {}", sms.phone_number));
        self.log.append(format!("Message: {message}"));

        if sms.needs_pdu_mode() {
            self.log.append("Detected: Unicode - Using PDU mode");
            self.send_pdu_mode(channel, &sms).await
        } else {
            self.log.append("Detected: ASCII - Using 7-bit text mode");
            self.send_text_mode(channel, &sms).await
        }
    }
}

impl SmsReceiver for SmsModem {
    fn set_inbound_handler<F>(&self, handler: F)
    where
        F: Fn(InboundSms) + Send + Sync + 'static,
    {
        self.replace_handler(Some(Arc::new(handler)));
    }

    fn clear_inbound_handler(&self) {
        self.replace_handler(None);
    }
}
