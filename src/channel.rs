// ABOUTME: AT command channel giving one exchange at a time exclusive use of the serial connection
// ABOUTME: Sends commands, waits for result tokens or the `>` prompt, and aborts message input with ESC

use crate::client::error::ModemResult;
use crate::connection::Connection;
use crate::frame::{self, Frame};
use crate::log::DiagnosticLog;
use bytes::{Bytes, BytesMut};
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Final result of a successful command
pub const OK_TOKEN: &str = "OK";
/// Message input prompt sent after `AT+CMGS`
pub const PROMPT_TOKEN: &str = ">";
/// Ends message input and submits it
pub const CTRL_Z: u8 = 0x1A;
/// Cancels message input
pub const ESC: u8 = 0x1B;

/// How an exchange ended, with everything received while waiting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// The expected token was seen
    Matched(String),
    /// An error result line arrived before the expected token
    Rejected(String),
    /// Neither token arrived in time
    TimedOut(String),
}

impl ExchangeOutcome {
    pub fn is_matched(&self) -> bool {
        matches!(self, ExchangeOutcome::Matched(_))
    }

    /// Text received during the wait
    pub fn response(&self) -> &str {
        match self {
            ExchangeOutcome::Matched(response)
            | ExchangeOutcome::Rejected(response)
            | ExchangeOutcome::TimedOut(response) => response,
        }
    }
}

/// Shared owner of the modem connection
///
/// The connection sits behind a fair async mutex. An [`Exchange`] holds the
/// lock from the first write until its result is known, so the background
/// reader never consumes bytes meant for a command.
#[derive(Debug)]
pub struct CommandChannel {
    connection: Mutex<Connection>,
    log: DiagnosticLog,
    abort_settle: Duration,
}

impl CommandChannel {
    pub fn new(connection: Connection, log: DiagnosticLog, abort_settle: Duration) -> Self {
        Self {
            connection: Mutex::new(connection),
            log,
            abort_settle,
        }
    }

    pub fn log(&self) -> &DiagnosticLog {
        &self.log
    }

    /// Wait for exclusive use of the connection.
    pub async fn exchange(&self) -> Exchange<'_> {
        Exchange {
            connection: self.connection.lock().await,
            log: &self.log,
            abort_settle: self.abort_settle,
        }
    }

    /// Write `text` + CRLF without waiting for any reply.
    pub async fn send_command(&self, text: &str) -> ModemResult<()> {
        self.exchange().await.send_command(text).await
    }

    /// Run one command exchange: drain stale input, send `text`, then wait
    /// for `expected` or `ERROR`.
    pub async fn execute(
        &self,
        text: &str,
        expected: &str,
        timeout: Duration,
    ) -> ModemResult<ExchangeOutcome> {
        self.exchange().await.command(text, expected, timeout).await
    }

    /// Like [`execute`](Self::execute) but only reports whether `expected`
    /// arrived. Write failures, `ERROR` and timeouts all yield `false`.
    pub async fn send_command_await(&self, text: &str, expected: &str, timeout: Duration) -> bool {
        match self.execute(text, expected, timeout).await {
            Ok(outcome) => outcome.is_matched(),
            Err(e) => {
                warn!("Command {} failed: {}", text, e);
                self.log.append(format!("Command failed: {e}"));
                false
            }
        }
    }

    /// Read one chunk for the background reader, holding the connection
    /// only for the duration of the read.
    pub(crate) async fn read_chunk(&self, wait: Duration) -> ModemResult<Option<Bytes>> {
        self.connection.lock().await.read_chunk(wait).await
    }
}

/// Exclusive use of the connection for one command/response exchange
///
/// Dropping the exchange hands the connection back to the reader and to
/// other callers.
pub struct Exchange<'a> {
    connection: MutexGuard<'a, Connection>,
    log: &'a DiagnosticLog,
    abort_settle: Duration,
}

impl Exchange<'_> {
    /// Discard bytes that arrived before this exchange.
    pub async fn drain(&mut self) -> ModemResult<()> {
        let dropped = self.connection.drain().await?;
        if dropped > 0 {
            debug!("Discarded {} stale bytes", dropped);
        }
        Ok(())
    }

    /// Write `text` + CRLF.
    pub async fn send_command(&mut self, text: &str) -> ModemResult<()> {
        self.connection.write_line(text).await?;
        self.log.append(format!("TX: {text}"));
        Ok(())
    }

    /// Write bytes without a terminator (message body, PDU hex, Ctrl+Z).
    pub async fn write_raw(&mut self, bytes: &[u8]) -> ModemResult<()> {
        self.connection.write_raw(bytes).await
    }

    /// Drain, send `text`, then wait for `expected`.
    pub async fn command(
        &mut self,
        text: &str,
        expected: &str,
        timeout: Duration,
    ) -> ModemResult<ExchangeOutcome> {
        self.drain().await?;
        self.send_command(text).await?;
        self.await_token(expected, timeout).await
    }

    /// Accumulate input until a line matches `expected` (success) or a
    /// line is an error result (failure), or until `timeout` elapses.
    ///
    /// `OK`, `ERROR` and `>` only match as whole result lines, so echoed
    /// message text containing them does not end the wait. Other tokens
    /// match anywhere within a line. Success is checked first, so a chunk
    /// carrying both counts as success.
    pub async fn await_token(
        &mut self,
        expected: &str,
        timeout: Duration,
    ) -> ModemResult<ExchangeOutcome> {
        self.log.append(format!("Waiting for: {expected}"));
        let deadline = Instant::now() + timeout;
        let mut response = String::new();
        let mut pending = BytesMut::new();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let Some(chunk) = self.connection.read_chunk(remaining).await? else {
                break;
            };

            let text = String::from_utf8_lossy(&chunk);
            self.log.append(format!("CMD RX: {}", text.trim()));
            response.push_str(&text);
            pending.extend_from_slice(&chunk);

            let lines = frame::take_lines(&mut pending);
            let tail = String::from_utf8_lossy(&pending);
            let matched = lines.iter().any(|line| is_expected(line, expected, false))
                || is_expected(&tail, expected, true);
            if matched {
                self.log.append(format!("Response received: {expected}"));
                return Ok(ExchangeOutcome::Matched(response));
            }
            if lines.iter().any(|line| Frame::classify(line) == Frame::Error) {
                self.log.append("ERROR response received");
                return Ok(ExchangeOutcome::Rejected(response));
            }
        }

        self.log.append(format!("Timeout waiting for: {expected}"));
        Ok(ExchangeOutcome::TimedOut(response))
    }

    /// Wait for the `>` message input prompt.
    pub async fn await_prompt(&mut self, timeout: Duration) -> ModemResult<ExchangeOutcome> {
        self.await_token(PROMPT_TOKEN, timeout).await
    }

    /// Cancel message input with ESC and give the modem time to settle.
    pub async fn abort(&mut self) -> ModemResult<()> {
        self.log.append("Aborting message input");
        self.connection.write_raw(&[ESC]).await?;
        tokio::time::sleep(self.abort_settle).await;
        Ok(())
    }
}

/// Whether `line` ends the wait for `expected`. `partial` marks bytes not yet
/// terminated by CRLF, where only the prompt or a plain token can match.
fn is_expected(line: &str, expected: &str, partial: bool) -> bool {
    match Frame::classify(expected) {
        Frame::Ok | Frame::Error if partial => false,
        target @ (Frame::Ok | Frame::Error | Frame::Prompt) => Frame::classify(line) == target,
        _ => !line.is_empty() && line.contains(expected),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, duplex};

    const SETTLE: Duration = Duration::from_millis(500);

    fn channel() -> (CommandChannel, DuplexStream) {
        let (local, remote) = duplex(1024);
        let channel = CommandChannel::new(
            Connection::new(local, "duplex"),
            DiagnosticLog::default(),
            SETTLE,
        );
        (channel, remote)
    }

    #[tokio::test(start_paused = true)]
    async fn test_command_matches_ok() {
        let (channel, mut modem) = channel();
        let responder = tokio::spawn(async move {
            let mut buf = [0u8; 4];
            modem.read_exact(&mut buf).await.unwrap();
            assert_eq!(&buf, b"AT\r\n");
            modem.write_all(b"AT\r\nOK\r\n").await.unwrap();
            modem
        });

        assert!(channel.send_command_await("AT", "OK", Duration::from_secs(2)).await);
        responder.await.unwrap();
        assert!(channel.log().read().contains("TX: AT"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_command_times_out_on_silence() {
        let (channel, _modem) = channel();
        let outcome = channel
            .execute("AT", "OK", Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(outcome, ExchangeOutcome::TimedOut(String::new()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_rejects_command() {
        let (channel, mut modem) = channel();
        let responder = tokio::spawn(async move {
            let mut buf = [0u8; 11];
            modem.read_exact(&mut buf).await.unwrap();
            modem.write_all(b"\r\nERROR\r\n").await.unwrap();
            modem
        });

        let outcome = channel
            .execute("AT+CMGF=0", "OK", Duration::from_secs(2))
            .await
            .unwrap();
        assert!(matches!(outcome, ExchangeOutcome::Rejected(_)));
        responder.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_checked_before_error() {
        let (channel, mut modem) = channel();
        let responder = tokio::spawn(async move {
            let mut buf = [0u8; 4];
            modem.read_exact(&mut buf).await.unwrap();
            modem.write_all(b"ERROR\r\nOK\r\n").await.unwrap();
            modem
        });

        assert!(channel.send_command_await("AT", "OK", Duration::from_secs(2)).await);
        responder.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_result_words_inside_text_do_not_end_wait() {
        let (channel, mut modem) = channel();
        let responder = tokio::spawn(async move {
            let mut buf = [0u8; 4];
            modem.read_exact(&mut buf).await.unwrap();
            modem.write_all(b"Server ERROR 500 LOOK\r\n").await.unwrap();
            tokio::time::sleep(Duration::from_secs(1)).await;
            modem.write_all(b"\r\nOK\r\n").await.unwrap();
            modem
        });

        let outcome = channel
            .execute("AT", "OK", Duration::from_secs(5))
            .await
            .unwrap();
        assert!(outcome.is_matched());
        assert!(outcome.response().starts_with("Server ERROR 500"));
        responder.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_prompt_matches_without_line_ending() {
        let (channel, mut modem) = channel();
        let mut exchange = channel.exchange().await;
        exchange.send_command("AT+CMGS=22").await.unwrap();
        modem.write_all(b"AT+CMGS=22\r\r\n> ").await.unwrap();

        let outcome = exchange.await_prompt(Duration::from_secs(5)).await.unwrap();
        assert!(outcome.is_matched());
    }

    #[tokio::test(start_paused = true)]
    async fn test_plain_token_matches_within_line() {
        let (channel, mut modem) = channel();
        let responder = tokio::spawn(async move {
            let mut buf = [0u8; 8];
            modem.read_exact(&mut buf).await.unwrap();
            modem.write_all(b"\r\n+CSQ: 17,0\r\n").await.unwrap();
            modem
        });

        assert!(channel.send_command_await("AT+CSQ", "+CSQ:", Duration::from_secs(2)).await);
        responder.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_input_is_drained() {
        let (channel, mut modem) = channel();
        // Left over from an earlier command, must not satisfy this one
        modem.write_all(b"OK\r\n").await.unwrap();

        assert!(!channel.send_command_await("AT", "OK", Duration::from_secs(2)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_writes_escape() {
        let (channel, mut modem) = channel();
        channel.exchange().await.abort().await.unwrap();

        let mut buf = [0u8; 1];
        modem.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf[0], ESC);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_link_reports_false() {
        let (channel, modem) = channel();
        drop(modem);
        assert!(!channel.send_command_await("AT", "OK", Duration::from_secs(2)).await);
    }
}
