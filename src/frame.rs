// ABOUTME: Classifies the text lines a modem emits into final results, prompts and notifications
// ABOUTME: Also extracts complete CRLF-terminated lines from the serial read buffer

use crate::codec::ucs2;
use bytes::{Buf, BytesMut};

/// Prefix of the unsolicited new-message notification
pub const CMT_PREFIX: &str = "+CMT:";

/// Sender used when a `+CMT:` header carries no quoted address
pub const UNKNOWN_SENDER: &str = "Unknown";

/// Longest sender kept from a `+CMT:` header, in characters
pub const MAX_SENDER_LENGTH: usize = 100;

/// One line of modem output
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// Final result `OK`
    Ok,
    /// Final result `ERROR`, including `+CME ERROR:` and `+CMS ERROR:` variants
    Error,
    /// Message input prompt `>`
    Prompt,
    /// Header of an inbound SMS, the body follows on the next line
    InboundHeader { sender: String },
    /// Anything else: command responses, echoes, SMS bodies
    Text(String),
    /// Blank separator line
    Empty,
}

impl Frame {
    /// Classify a single line. Surrounding whitespace is ignored.
    pub fn classify(line: &str) -> Frame {
        let line = line.trim();
        match line {
            "" => Frame::Empty,
            "OK" => Frame::Ok,
            "ERROR" => Frame::Error,
            ">" => Frame::Prompt,
            line if line.starts_with("+CME ERROR") || line.starts_with("+CMS ERROR") => {
                Frame::Error
            }
            line if line.starts_with(CMT_PREFIX) => Frame::InboundHeader {
                sender: parse_sender(line),
            },
            line => Frame::Text(line.to_string()),
        }
    }
}

/// Extract the sender from a `+CMT: "<sender>","",<timestamp>` header.
///
/// The sender is the second `"`-delimited field, truncated to
/// [`MAX_SENDER_LENGTH`] characters and decoded when it is UCS2 hex.
pub fn parse_sender(header: &str) -> String {
    let Some(sender) = header.split('"').nth(1) else {
        return UNKNOWN_SENDER.to_string();
    };
    let sender: String = sender.chars().take(MAX_SENDER_LENGTH).collect();
    ucs2::decode_if_hex(&sender)
}

/// Remove every complete CRLF-terminated line from `buf`.
///
/// Lines are decoded lossily and trimmed. Bytes after the last CRLF stay in
/// the buffer for the next call.
pub fn take_lines(buf: &mut BytesMut) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(end) = buf.windows(2).position(|pair| pair == b"\r\n") {
        let line = buf.split_to(end);
        buf.advance(2);
        lines.push(String::from_utf8_lossy(&line).trim().to_string());
    }
    lines
}
