//! End-to-end tests of the modem client against a scripted fake modem

use crate::client::{
    InboundSms, LinkState, ModemBuilder, ModemConnection, ModemError, ModemOptions, SmsModem,
    SmsReceiver, SmsTransmitter, ValidationError,
};
use crate::codec::CodecError;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, duplex};
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tokio::task::JoinHandle;

const CTRL_Z: &str = "\u{1A}";
const ESC: &str = "\u{1B}";

/// One step of a fake modem script
enum Step {
    /// Wait until the client has written `expect`, then answer with `reply`
    Expect(Vec<u8>, Vec<u8>),
    /// Write unsolicited output
    Push(Vec<u8>),
    /// Stay quiet for a while
    Pause(Duration),
}

impl Step {
    fn expect(expect: impl AsRef<[u8]>, reply: impl AsRef<[u8]>) -> Step {
        Step::Expect(expect.as_ref().to_vec(), reply.as_ref().to_vec())
    }

    fn push(bytes: impl AsRef<[u8]>) -> Step {
        Step::Push(bytes.as_ref().to_vec())
    }
}

/// Everything the client wrote, and whether every scripted step ran
struct Transcript {
    bytes: Vec<u8>,
    completed: bool,
}

impl Transcript {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len().max(1))
        .position(|window| window == needle)
}

/// Plays `script` on the modem side of a duplex link until the client
/// closes it.
fn spawn_fake_modem(mut stream: DuplexStream, script: Vec<Step>) -> JoinHandle<Transcript> {
    tokio::spawn(async move {
        let mut bytes = Vec::new();
        let mut matched = 0;
        let mut buf = [0u8; 512];

        for step in script {
            match step {
                Step::Push(output) => {
                    if stream.write_all(&output).await.is_err() {
                        return Transcript { bytes, completed: false };
                    }
                }
                Step::Pause(duration) => tokio::time::sleep(duration).await,
                Step::Expect(expected, reply) => {
                    loop {
                        if let Some(pos) = find(&bytes[matched..], &expected) {
                            matched += pos + expected.len();
                            break;
                        }
                        match stream.read(&mut buf).await {
                            Ok(0) | Err(_) => return Transcript { bytes, completed: false },
                            Ok(n) => bytes.extend_from_slice(&buf[..n]),
                        }
                    }
                    if stream.write_all(&reply).await.is_err() {
                        return Transcript { bytes, completed: false };
                    }
                }
            }
        }

        // Keep recording until the client hangs up
        while let Ok(n) = stream.read(&mut buf).await {
            if n == 0 {
                break;
            }
            bytes.extend_from_slice(&buf[..n]);
        }
        Transcript {
            bytes,
            completed: true,
        }
    })
}

fn init_script() -> Vec<Step> {
    vec![
        Step::expect("AT\r\n", "AT\r\r\nOK\r\n"),
        Step::expect("AT+CMGF=1\r\n", "\r\nOK\r\n"),
        Step::expect("AT+CSCS=\"GSM\"\r\n", "\r\nOK\r\n"),
        Step::expect("AT+CNMI=2,2,0,0,0\r\n", "\r\nOK\r\n"),
    ]
}

const INIT_TRANSCRIPT: &str = "AT\r\nAT+CMGF=1\r\nAT+CSCS=\"GSM\"\r\nAT+CNMI=2,2,0,0,0\r\n";

/// Connect a client to a fake modem running the init sequence followed by
/// `script`.
async fn connected(
    script: Vec<Step>,
) -> (SmsModem, JoinHandle<Transcript>, UnboundedReceiver<InboundSms>) {
    let (local, remote) = duplex(4096);
    let mut steps = init_script();
    steps.extend(script);
    let fake = spawn_fake_modem(remote, steps);

    let (tx, rx) = unbounded_channel();
    let modem = ModemBuilder::new()
        .on_message(move |sms| {
            let _ = tx.send(sms);
        })
        .connect_transport(local)
        .await
        .unwrap();
    (modem, fake, rx)
}

async fn finish(mut modem: SmsModem, fake: JoinHandle<Transcript>) -> Transcript {
    modem.disconnect().await.unwrap();
    let transcript = fake.await.unwrap();
    assert!(transcript.completed, "script incomplete: {:?}", transcript.text());
    transcript
}

async fn next_message(rx: &mut UnboundedReceiver<InboundSms>) -> InboundSms {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no inbound message")
        .expect("handler dropped")
}

#[tokio::test(start_paused = true)]
async fn test_connect_runs_init_sequence() {
    let (modem, fake, _rx) = connected(vec![]).await;
    assert!(modem.is_connected());
    assert_eq!(modem.state(), LinkState::Connected);

    let logs = modem.logs();
    assert!(logs.contains("TX: AT+CNMI=2,2,0,0,0"));
    assert!(logs.contains("Connected successfully!"));

    let transcript = finish(modem, fake).await;
    assert_eq!(transcript.text(), INIT_TRANSCRIPT);
}

#[tokio::test(start_paused = true)]
async fn test_connect_fails_without_handshake() {
    let (local, remote) = duplex(4096);
    let fake = spawn_fake_modem(remote, vec![]);

    let mut modem = SmsModem::new();
    let result = modem.connect_transport(local).await;
    assert!(matches!(result, Err(ModemError::Handshake)));
    assert!(!modem.is_connected());
    assert_eq!(modem.state(), LinkState::Disconnected);

    // The link is closed on failure
    let transcript = fake.await.unwrap();
    assert_eq!(transcript.text(), "AT\r\n");
}

#[tokio::test(start_paused = true)]
async fn test_connect_rejects_empty_port_name() {
    let mut modem = SmsModem::new();
    assert!(matches!(
        modem.connect("").await,
        Err(ModemError::PortOpen { .. })
    ));
    assert!(modem.logs().contains("No port specified"));
}

#[tokio::test(start_paused = true)]
async fn test_optional_init_failures_are_tolerated() {
    let (local, remote) = duplex(4096);
    let fake = spawn_fake_modem(
        remote,
        vec![
            Step::expect("AT\r\n", "OK\r\n"),
            Step::expect("AT+CMGF=1\r\n", "ERROR\r\n"),
            // No answer to the character set
            Step::expect("AT+CSCS=\"GSM\"\r\n", ""),
            Step::expect("AT+CNMI=2,2,0,0,0\r\n", "OK\r\n"),
        ],
    );

    let modem = ModemBuilder::new().connect_transport(local).await.unwrap();
    assert!(modem.is_connected());
    finish(modem, fake).await;
}

#[tokio::test(start_paused = true)]
async fn test_connection_test_results() {
    let (modem, fake, _rx) = connected(vec![
        Step::expect("AT\r\n", "AT\r\r\nOK\r\n"),
        Step::expect("AT\r\n", "\r\nERROR\r\n"),
        Step::expect("AT\r\n", ""),
    ])
    .await;

    assert!(modem.test_connection().await);
    assert!(!modem.test_connection().await);
    assert!(!modem.test_connection().await);
    assert!(modem.logs().contains("Test failed: Timeout"));

    finish(modem, fake).await;
}

#[tokio::test(start_paused = true)]
async fn test_disconnected_client() {
    let mut modem = SmsModem::new();
    assert!(!modem.test_connection().await);
    assert!(matches!(
        modem.send_sms("+123", "hi").await,
        Err(ModemError::InvalidState(_))
    ));
    // Idempotent
    modem.disconnect().await.unwrap();
    modem.disconnect().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_send_text_mode() {
    let (modem, fake, _rx) = connected(vec![
        Step::expect("AT+CSCS=\"GSM\"\r\n", "OK\r\n"),
        Step::expect("AT+CMGS=\"+1234567890\"\r\n", "\r\n> "),
        Step::expect(format!("Hello World{CTRL_Z}"), "\r\n+CMGS: 7\r\n\r\nOK\r\n"),
    ])
    .await;

    modem.send_sms("+1234567890", "Hello\nWorld").await.unwrap();
    assert!(modem.logs().contains("SMS sent successfully!"));

    let transcript = finish(modem, fake).await.text();
    assert!(transcript.ends_with(&format!(
        "AT+CSCS=\"GSM\"\r\nAT+CMGS=\"+1234567890\"\r\nHello World{CTRL_Z}"
    )));
    assert!(!transcript.contains(ESC));
}

#[tokio::test(start_paused = true)]
async fn test_text_mode_without_prompt_aborts() {
    let (modem, fake, _rx) = connected(vec![
        Step::expect("AT+CSCS=\"GSM\"\r\n", "OK\r\n"),
        Step::expect("AT+CMGS=\"+1234567890\"\r\n", ""),
        Step::expect(ESC, ""),
    ])
    .await;

    let result = modem.send_sms("+1234567890", "Hello").await;
    assert!(matches!(result, Err(ModemError::NoPrompt)));

    let transcript = finish(modem, fake).await.text();
    assert!(!transcript.contains("Hello"));
    assert!(transcript.ends_with(&format!("AT+CMGS=\"+1234567890\"\r\n{ESC}")));
}

#[tokio::test(start_paused = true)]
async fn test_text_mode_network_error_aborts() {
    let (modem, fake, _rx) = connected(vec![
        Step::expect("AT+CSCS=\"GSM\"\r\n", "OK\r\n"),
        Step::expect("AT+CMGS=\"5551234\"\r\n", "> "),
        Step::expect(format!("Hi{CTRL_Z}"), "\r\n+CMS ERROR: 38\r\n"),
        Step::expect(ESC, ""),
    ])
    .await;

    let result = modem.send_sms("5551234", "Hi").await;
    assert!(matches!(result, Err(ModemError::Protocol { .. })));
    finish(modem, fake).await;
}

#[tokio::test(start_paused = true)]
async fn test_echoed_body_with_error_text_is_not_a_failure() {
    let (modem, fake, _rx) = connected(vec![
        Step::expect("AT+CSCS=\"GSM\"\r\n", "OK\r\n"),
        Step::expect("AT+CMGS=\"5551234\"\r\n", "\r\n> "),
        Step::expect(
            format!("Server ERROR 500{CTRL_Z}"),
            format!("Server ERROR 500{CTRL_Z}"),
        ),
        Step::Pause(Duration::from_secs(3)),
        Step::push("\r\n+CMGS: 9\r\n\r\nOK\r\n"),
    ])
    .await;

    modem.send_sms("5551234", "Server ERROR 500").await.unwrap();
    assert!(modem.logs().contains("SMS sent successfully!"));

    let transcript = finish(modem, fake).await.text();
    assert!(!transcript.contains(ESC));
}

#[tokio::test(start_paused = true)]
async fn test_charset_failure_aborts_before_cmgs() {
    let (modem, fake, _rx) = connected(vec![
        Step::expect("AT+CSCS=\"GSM\"\r\n", "ERROR\r\n"),
        Step::expect(ESC, ""),
    ])
    .await;

    let result = modem.send_sms("5551234", "Hi").await;
    assert!(matches!(result, Err(ModemError::Protocol { .. })));

    let transcript = finish(modem, fake).await.text();
    assert!(!transcript.contains("AT+CMGS"));
}

#[tokio::test(start_paused = true)]
async fn test_send_pdu_mode() {
    let pdu = "0011000C918919325476980008FF080633064406270645";
    let (modem, fake, _rx) = connected(vec![
        Step::expect("AT+CMGF=0\r\n", "OK\r\n"),
        Step::expect("AT+CMGS=22\r\n", "> "),
        Step::expect(format!("{pdu}{CTRL_Z}"), "\r\n+CMGS: 8\r\n\r\nOK\r\n"),
        Step::expect("AT+CMGF=1\r\n", "OK\r\n"),
    ])
    .await;

    modem.send_sms("+989123456789", "سلام").await.unwrap();
    let logs = modem.logs();
    assert!(logs.contains(&format!("PDU: {pdu}")));
    assert!(logs.contains("TPDU Length: 22"));

    let transcript = finish(modem, fake).await.text();
    assert!(transcript.ends_with(&format!(
        "AT+CMGF=0\r\nAT+CMGS=22\r\n{pdu}{CTRL_Z}AT+CMGF=1\r\n"
    )));
}

#[tokio::test(start_paused = true)]
async fn test_pdu_failure_aborts_then_restores_text_mode() {
    let (modem, fake, _rx) = connected(vec![
        Step::expect("AT+CMGF=0\r\n", "OK\r\n"),
        Step::expect("AT+CMGS=22\r\n", "\r\nERROR\r\n"),
        Step::expect(ESC, ""),
        Step::expect("AT+CMGF=1\r\n", "OK\r\n"),
    ])
    .await;

    let result = modem.send_sms("+989123456789", "سلام").await;
    assert!(matches!(result, Err(ModemError::NoPrompt)));
    finish(modem, fake).await;
}

#[tokio::test(start_paused = true)]
async fn test_pdu_mode_switch_failure_still_restores_text_mode() {
    let (modem, fake, _rx) = connected(vec![
        Step::expect("AT+CMGF=0\r\n", "ERROR\r\n"),
        Step::expect(ESC, ""),
        Step::expect("AT+CMGF=1\r\n", "OK\r\n"),
    ])
    .await;

    let result = modem.send_sms("+98912", "سلام").await;
    assert!(matches!(result, Err(ModemError::Protocol { .. })));

    let transcript = finish(modem, fake).await.text();
    assert!(!transcript.contains("AT+CMGS"));
}

#[tokio::test(start_paused = true)]
async fn test_invalid_requests_never_reach_the_modem() {
    let (modem, fake, _rx) = connected(vec![]).await;

    assert!(matches!(
        modem.send_sms("", "hi").await,
        Err(ModemError::Validation(ValidationError::EmptyPhoneNumber))
    ));
    assert!(matches!(
        modem.send_sms("abc", "hi").await,
        Err(ModemError::Validation(ValidationError::InvalidPhoneNumber(_)))
    ));
    assert!(matches!(
        modem.send_sms("123", "").await,
        Err(ModemError::Validation(ValidationError::EmptyMessage))
    ));
    assert!(matches!(
        modem.send_sms("123", &"a".repeat(161)).await,
        Err(ModemError::Validation(ValidationError::MessageTooLong { .. }))
    ));
    assert!(matches!(
        modem.send_sms("123", &"ب".repeat(71)).await,
        Err(ModemError::Validation(ValidationError::MessageTooLong { .. }))
    ));
    assert!(matches!(
        modem.send_sms("123", "stop\u{1A}AT+CMGD=1").await,
        Err(ModemError::Validation(ValidationError::ControlCharacters))
    ));
    // Fits 70 characters but not 140 octets of UCS2
    assert!(matches!(
        modem.send_sms("123", &"😀".repeat(70)).await,
        Err(ModemError::Codec(CodecError::MessageTooLong { .. }))
    ));

    let transcript = finish(modem, fake).await;
    assert_eq!(transcript.text(), INIT_TRANSCRIPT);
}

#[tokio::test(start_paused = true)]
async fn test_inbound_message_is_delivered() {
    let (modem, fake, mut rx) = connected(vec![
        Step::Pause(Duration::from_millis(500)),
        Step::push("\r\n+CMT: \"+1234567890\",\"\",\"21/01/05,12:30:45+00\"\r\nHello there\r\n"),
    ])
    .await;

    let sms = next_message(&mut rx).await;
    assert_eq!(sms.sender, "+1234567890");
    assert_eq!(sms.body, "Hello there");
    assert!(modem.logs().contains("Incoming SMS from: +1234567890"));

    finish(modem, fake).await;
}

#[tokio::test(start_paused = true)]
async fn test_inbound_ucs2_message_split_across_reads() {
    let (modem, fake, mut rx) = connected(vec![
        Step::Pause(Duration::from_millis(500)),
        Step::push("+CMT: \"002B0039003800390031\",\"\",\"24/03/01,09:00:00+14\"\r\n0633"),
        Step::Pause(Duration::from_millis(300)),
        Step::push("064406270645\r\n"),
    ])
    .await;

    let sms = next_message(&mut rx).await;
    assert_eq!(sms.sender, "+9891");
    assert_eq!(sms.body, "سلام");

    finish(modem, fake).await;
}

#[tokio::test(start_paused = true)]
async fn test_panicking_handler_does_not_stop_reader() {
    let (local, remote) = duplex(4096);
    let mut script = init_script();
    script.extend([
        Step::Pause(Duration::from_millis(500)),
        Step::push("+CMT: \"+1\",\"\",\"\"\r\nboom\r\n"),
        Step::Pause(Duration::from_millis(500)),
        Step::push("+CMT: \"+2\",\"\",\"\"\r\nafter\r\n"),
    ]);
    let fake = spawn_fake_modem(remote, script);

    let (tx, mut rx) = unbounded_channel();
    let modem = ModemBuilder::new().connect_transport(local).await.unwrap();
    modem.set_inbound_handler(move |sms: InboundSms| {
        if sms.body == "boom" {
            panic!("handler failure");
        }
        let _ = tx.send(sms);
    });

    let sms = next_message(&mut rx).await;
    assert_eq!(sms.sender, "+2");
    assert_eq!(sms.body, "after");
    assert!(modem.logs().contains("Inbound handler panicked"));

    finish(modem, fake).await;
}

#[tokio::test(start_paused = true)]
async fn test_exchange_after_inbound_message() {
    let (modem, fake, mut rx) = connected(vec![
        Step::Pause(Duration::from_millis(500)),
        Step::push("+CMT: \"+44\",\"\",\"\"\r\nping\r\n"),
        Step::expect("AT\r\n", "OK\r\n"),
    ])
    .await;

    assert_eq!(next_message(&mut rx).await.body, "ping");
    assert!(modem.test_connection().await);

    finish(modem, fake).await;
}

#[tokio::test(start_paused = true)]
async fn test_cleared_handler_only_logs() {
    let (modem, fake, mut rx) = connected(vec![
        Step::Pause(Duration::from_millis(500)),
        Step::push("+CMT: \"+44\",\"\",\"\"\r\nunseen\r\n"),
        Step::expect("AT\r\n", "OK\r\n"),
    ])
    .await;
    modem.clear_inbound_handler();

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(modem.test_connection().await);
    assert!(modem.logs().contains("SMS Body: unseen"));
    assert!(rx.try_recv().is_err());

    finish(modem, fake).await;
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_stops_reader_and_closes_link() {
    let (mut modem, fake, _rx) = connected(vec![]).await;
    modem.disconnect().await.unwrap();
    assert!(!modem.is_connected());
    assert_eq!(modem.state(), LinkState::Disconnected);
    assert!(!modem.test_connection().await);
    assert!(modem.logs().contains("Port closed"));

    let transcript = fake.await.unwrap();
    assert!(transcript.completed);

    modem.disconnect().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_custom_options_apply() {
    let (local, remote) = duplex(4096);
    let fake = spawn_fake_modem(remote, init_script());
    let options = ModemOptions::default()
        .with_startup_delay(Duration::ZERO)
        .with_log_capacity(5);

    let modem = ModemBuilder::new()
        .options(options)
        .connect_transport(local)
        .await
        .unwrap();
    assert_eq!(modem.diagnostics().capacity(), 5);
    assert_eq!(modem.diagnostics().len(), 5);

    modem.clear_logs();
    assert!(modem.logs().is_empty());
    finish(modem, fake).await;
}
