// ABOUTME: Serial link to the modem: port settings, raw writes, draining and bounded chunk reads
// ABOUTME: Works over any async byte stream so tests and bridges can stand in for a real port

use crate::client::error::{ModemError, ModemResult};
use bytes::{Bytes, BytesMut};
use std::fmt;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tokio_serial::SerialPortBuilderExt;

pub use tokio_serial::{DataBits, FlowControl, Parity, StopBits};

/// Line terminator appended to every AT command
pub const CRLF: &[u8] = b"\r\n";

/// Any bidirectional async byte stream the modem can be reached through
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// Serial line parameters
///
/// Defaults to the SIM800L factory setting: 9600 baud, 8 data bits, no
/// parity, 1 stop bit, no flow control, 1 s read timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub flow_control: FlowControl,
    pub read_timeout: Duration,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
            read_timeout: Duration::from_millis(1000),
        }
    }
}

impl SerialSettings {
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn with_flow_control(mut self, flow_control: FlowControl) -> Self {
        self.flow_control = flow_control;
        self
    }
}

/// Byte-level connection to the modem
///
/// Owns the transport and a scratch read buffer. Higher layers decide who
/// may read; see [`crate::channel::CommandChannel`].
pub struct Connection {
    stream: Box<dyn Transport>,
    buffer: BytesMut,
    name: String,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("name", &self.name)
            .field("buffered", &self.buffer.len())
            .finish()
    }
}

impl Connection {
    /// Wrap an already open transport.
    pub fn new(transport: impl Transport + 'static, name: impl Into<String>) -> Connection {
        Connection {
            stream: Box::new(transport),
            buffer: BytesMut::with_capacity(1024),
            name: name.into(),
        }
    }

    /// Open `port_name` with the given serial settings.
    pub fn open(port_name: &str, settings: &SerialSettings) -> ModemResult<Connection> {
        let serial = tokio_serial::new(port_name, settings.baud_rate)
            .data_bits(settings.data_bits)
            .parity(settings.parity)
            .stop_bits(settings.stop_bits)
            .flow_control(settings.flow_control)
            .timeout(settings.read_timeout)
            .open_native_async()
            .map_err(|e| ModemError::PortOpen {
                port: port_name.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Connection::new(serial, port_name))
    }

    /// Port name or transport description
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Write bytes as-is and flush.
    pub async fn write_raw(&mut self, bytes: &[u8]) -> ModemResult<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Write `command` followed by CRLF.
    pub async fn write_line(&mut self, command: &str) -> ModemResult<()> {
        let mut line = Vec::with_capacity(command.len() + CRLF.len());
        line.extend_from_slice(command.as_bytes());
        line.extend_from_slice(CRLF);
        self.write_raw(&line).await
    }

    /// Discard every byte that is already available without waiting.
    ///
    /// Returns the number of bytes dropped.
    pub async fn drain(&mut self) -> ModemResult<usize> {
        let mut dropped = 0;
        loop {
            self.buffer.clear();
            match timeout(Duration::ZERO, self.stream.read_buf(&mut self.buffer)).await {
                Ok(Ok(0)) => return Err(ModemError::ConnectionClosed),
                Ok(Ok(n)) => dropped += n,
                Ok(Err(e)) if e.kind() == io::ErrorKind::TimedOut => break,
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => break,
            }
        }
        self.buffer.clear();
        Ok(dropped)
    }

    /// Read whatever arrives within `wait`.
    ///
    /// `Ok(None)` means nothing arrived in time. End of stream is reported
    /// as [`ModemError::ConnectionClosed`].
    pub async fn read_chunk(&mut self, wait: Duration) -> ModemResult<Option<Bytes>> {
        self.buffer.clear();
        self.buffer.reserve(1024);
        match timeout(wait, self.stream.read_buf(&mut self.buffer)).await {
            Ok(Ok(0)) => Err(ModemError::ConnectionClosed),
            Ok(Ok(_)) => Ok(Some(self.buffer.split().freeze())),
            Ok(Err(e)) if e.kind() == io::ErrorKind::TimedOut => Ok(None),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Ok(None),
        }
    }
}
