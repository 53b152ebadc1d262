// ABOUTME: Background task reading unsolicited modem output between command exchanges
// ABOUTME: Reassembles lines, pairs +CMT headers with their body line and dispatches inbound SMS

use crate::channel::CommandChannel;
use crate::client::error::ModemResult;
use crate::client::types::InboundSms;
use crate::codec::ucs2;
use crate::frame::{self, Frame};
use crate::log::DiagnosticLog;
use bytes::BytesMut;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Callback invoked for every inbound SMS
pub type InboundHandler = Arc<dyn Fn(InboundSms) + Send + Sync>;

/// Handler slot shared between the client and the reader task
pub(crate) type SharedHandler = Arc<RwLock<Option<InboundHandler>>>;

/// Pairs `+CMT:` headers with the body line that follows them
#[derive(Debug, Default)]
pub struct InboundAssembler {
    pending_sender: Option<String>,
}

impl InboundAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sender of a header still waiting for its body
    pub fn pending_sender(&self) -> Option<&str> {
        self.pending_sender.as_deref()
    }

    /// Feed one trimmed line; returns a message once its body arrives.
    ///
    /// Blank lines and `OK` between header and body are skipped. Any other
    /// line following a header is the body.
    pub fn feed(&mut self, line: &str) -> Option<InboundSms> {
        match Frame::classify(line) {
            Frame::InboundHeader { sender } => {
                self.pending_sender = Some(sender);
                return None;
            }
            Frame::Empty | Frame::Ok => return None,
            _ => {}
        }

        let sender = self.pending_sender.take()?;
        Some(InboundSms {
            sender,
            body: ucs2::decode_if_hex(line),
        })
    }
}

/// Handle to a running reader task
#[derive(Debug)]
pub struct ReaderHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReaderHandle {
    /// Ask the reader to stop and wait up to `join_timeout` for it, then
    /// abort it.
    pub async fn stop(self, join_timeout: Duration) {
        let _ = self.shutdown.send(true);
        let mut task = self.task;
        match tokio::time::timeout(join_timeout, &mut task).await {
            Ok(Ok(())) => debug!("Reader task stopped"),
            Ok(Err(e)) => warn!("Reader task ended abnormally: {}", e),
            Err(_) => {
                warn!("Reader task did not stop in {:?}, aborting", join_timeout);
                task.abort();
            }
        }
    }

    /// Stop the reader without waiting for it.
    pub fn abort(self) {
        let _ = self.shutdown.send(true);
        self.task.abort();
    }
}

/// Background reader for unsolicited modem output
pub struct Reader {
    channel: Arc<CommandChannel>,
    handler: SharedHandler,
    log: DiagnosticLog,
    poll_interval: Duration,
    buffer: BytesMut,
    assembler: InboundAssembler,
    last_error: Option<String>,
}

impl Reader {
    pub(crate) fn new(
        channel: Arc<CommandChannel>,
        handler: SharedHandler,
        poll_interval: Duration,
    ) -> Self {
        let log = channel.log().clone();
        Self {
            channel,
            handler,
            log,
            poll_interval,
            buffer: BytesMut::with_capacity(1024),
            assembler: InboundAssembler::new(),
            last_error: None,
        }
    }

    /// Spawn the reader on the current runtime.
    pub(crate) fn spawn(self) -> ReaderHandle {
        let (shutdown, stopped) = watch::channel(false);
        let task = tokio::spawn(self.run(stopped));
        ReaderHandle { shutdown, task }
    }

    async fn run(mut self, mut stopped: watch::Receiver<bool>) {
        info!("Reader started");
        loop {
            tokio::select! {
                biased;
                _ = stopped.changed() => break,
                result = self.poll_once() => {
                    if let Err(e) = result {
                        self.report(e.to_string());
                        tokio::time::sleep(self.poll_interval).await;
                    }
                }
            }
        }
        info!("Reader stopped");
    }

    /// Read once for at most one poll interval and process complete lines.
    async fn poll_once(&mut self) -> ModemResult<()> {
        let Some(chunk) = self.channel.read_chunk(self.poll_interval).await? else {
            return Ok(());
        };
        self.last_error = None;

        let text = String::from_utf8_lossy(&chunk);
        self.log.append(format!("Reader RX: {}", text.trim()));
        self.buffer.extend_from_slice(&chunk);

        for line in frame::take_lines(&mut self.buffer) {
            self.process_line(&line);
        }
        Ok(())
    }

    fn process_line(&mut self, line: &str) {
        match self.assembler.feed(line) {
            Some(sms) => {
                self.log.append(format!("SMS Body: {}", sms.body));
                self.dispatch(sms);
            }
            None if line.starts_with(frame::CMT_PREFIX) => {
                let sender = self.assembler.pending_sender().unwrap_or(frame::UNKNOWN_SENDER);
                self.log.append(format!("Incoming SMS from: {sender}"));
            }
            None => {}
        }
    }

    fn dispatch(&self, sms: InboundSms) {
        let handler = self
            .handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(handler) = handler else {
            debug!("No inbound handler, dropping message from {}", sms.sender);
            return;
        };

        if catch_unwind(AssertUnwindSafe(|| handler(sms))).is_err() {
            error!("Inbound handler panicked");
            self.log.append("Inbound handler panicked");
        }
    }

    fn report(&mut self, message: String) {
        // Repeats of the same failure are only traced
        if self.last_error.as_deref() == Some(message.as_str()) {
            debug!("Reader error: {}", message);
            return;
        }
        error!("Reader error: {}", message);
        self.log.append(format!("Reader error: {message}"));
        self.last_error = Some(message);
    }
}
