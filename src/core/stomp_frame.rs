//! STOMP 1.2 Frame Codec
//!
//! Parses and serializes frames as described in
//! https://stomp.github.io/stomp-specification-1.2.html
//!
//! Wire layout:
//! ```text
//! COMMAND\n
//! header1:value1\n
//! header2:value2\n
//! \n
//! body\0(\n)*
//! ```
//!
//! Only the headers of the 1.2 protocol are accepted; unknown header keys
//! and unknown commands are parse errors. Header values are taken verbatim
//! (no escape decoding).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

const NULL: u8 = b'\0';
const COLON: u8 = b':';
const NEW_LINE: u8 = b'\n';

// ============================================
// COMMANDS
// ============================================

/// Available STOMP commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StompCommand {
    Abort,
    Ack,
    Begin,
    Commit,
    Connect,
    Connected,
    Disconnect,
    Error,
    Message,
    Nack,
    Receipt,
    Send,
    Stomp,
    Subscribe,
    Unsubscribe,
}

impl StompCommand {
    pub const ALL: [StompCommand; 15] = [
        Self::Abort,
        Self::Ack,
        Self::Begin,
        Self::Commit,
        Self::Connect,
        Self::Connected,
        Self::Disconnect,
        Self::Error,
        Self::Message,
        Self::Nack,
        Self::Receipt,
        Self::Send,
        Self::Stomp,
        Self::Subscribe,
        Self::Unsubscribe,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Abort => "ABORT",
            Self::Ack => "ACK",
            Self::Begin => "BEGIN",
            Self::Commit => "COMMIT",
            Self::Connect => "CONNECT",
            Self::Connected => "CONNECTED",
            Self::Disconnect => "DISCONNECT",
            Self::Error => "ERROR",
            Self::Message => "MESSAGE",
            Self::Nack => "NACK",
            Self::Receipt => "RECEIPT",
            Self::Send => "SEND",
            Self::Stomp => "STOMP",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
        }
    }

    /// Headers a frame with this command must carry
    pub fn required_headers(&self) -> &'static [StompHeader] {
        match self {
            Self::Connect | Self::Stomp => &[StompHeader::AcceptVersion, StompHeader::Host],
            Self::Connected => &[StompHeader::Version],
            Self::Send => &[StompHeader::Destination],
            Self::Subscribe => &[StompHeader::Destination, StompHeader::Id],
            Self::Unsubscribe | Self::Ack | Self::Nack => &[StompHeader::Id],
            Self::Begin | Self::Commit | Self::Abort => &[StompHeader::Transaction],
            Self::Message => &[
                StompHeader::Destination,
                StompHeader::MessageId,
                StompHeader::Subscription,
            ],
            Self::Receipt => &[StompHeader::ReceiptId],
            Self::Disconnect | Self::Error => &[],
        }
    }
}

impl FromStr for StompCommand {
    type Err = StompError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|command| command.as_str() == s)
            .ok_or(StompError::CommandInvalid)
    }
}

impl fmt::Display for StompCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================
// HEADERS
// ============================================

/// Available STOMP headers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StompHeader {
    AcceptVersion,
    Ack,
    ContentLength,
    ContentType,
    Destination,
    HeartBeat,
    Host,
    Id,
    Login,
    Message,
    MessageId,
    Passcode,
    Receipt,
    ReceiptId,
    Session,
    Subscription,
    Transaction,
    Server,
    Version,
}

impl StompHeader {
    pub const ALL: [StompHeader; 19] = [
        Self::AcceptVersion,
        Self::Ack,
        Self::ContentLength,
        Self::ContentType,
        Self::Destination,
        Self::HeartBeat,
        Self::Host,
        Self::Id,
        Self::Login,
        Self::Message,
        Self::MessageId,
        Self::Passcode,
        Self::Receipt,
        Self::ReceiptId,
        Self::Session,
        Self::Subscription,
        Self::Transaction,
        Self::Server,
        Self::Version,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AcceptVersion => "accept-version",
            Self::Ack => "ack",
            Self::ContentLength => "content-length",
            Self::ContentType => "content-type",
            Self::Destination => "destination",
            Self::HeartBeat => "heart-beat",
            Self::Host => "host",
            Self::Id => "id",
            Self::Login => "login",
            Self::Message => "message",
            Self::MessageId => "message-id",
            Self::Passcode => "passcode",
            Self::Receipt => "receipt",
            Self::ReceiptId => "receipt-id",
            Self::Session => "session",
            Self::Subscription => "subscription",
            Self::Transaction => "transaction",
            Self::Server => "server",
            Self::Version => "version",
        }
    }
}

impl FromStr for StompHeader {
    type Err = StompError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|header| header.as_str() == s)
            .ok_or(StompError::HeaderInvalidKey)
    }
}

impl fmt::Display for StompHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================
// ERRORS
// ============================================

/// Reasons a frame fails to parse or validate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StompError {
    /// First line is not a known command
    CommandInvalid,
    /// A header required by the command is absent
    HeaderMissing,
    /// Frame has no line terminator at all
    HeaderEmpty,
    /// A header line is not terminated
    HeaderMissingNewLine,
    /// Header key is not a STOMP 1.2 header
    HeaderInvalidKey,
    /// Header has nothing after its colon
    HeaderEmptyValue,
    /// Header line has no colon
    HeaderMissingColon,
    /// content-length is not a number
    HeaderContentLength,
    /// Blank line between headers and body is missing
    BodyNoNewLine,
    /// content-length disagrees with the body
    BodyLength,
    /// Body is not terminated by NUL
    BodyMissingNull,
    /// Something other than newlines follows the terminating NUL
    WrongSymbolAfterBody,
}

impl StompError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CommandInvalid => "STOMP_COMMAND_INVALID",
            Self::HeaderMissing => "STOMP_HEADER_MISSING",
            Self::HeaderEmpty => "STOMP_HEADER_EMPTY",
            Self::HeaderMissingNewLine => "STOMP_HEADER_MISSING_NEW_LINE",
            Self::HeaderInvalidKey => "STOMP_HEADER_INVALID_KEY",
            Self::HeaderEmptyValue => "STOMP_HEADER_EMPTY_VALUE",
            Self::HeaderMissingColon => "STOMP_HEADER_MISSING_COLON",
            Self::HeaderContentLength => "STOMP_HEADER_CONTENT_LENGTH",
            Self::BodyNoNewLine => "STOMP_BODY_NO_NEW_LINE",
            Self::BodyLength => "STOMP_BODY_LENGTH",
            Self::BodyMissingNull => "STOMP_BODY_MISSING_NULL",
            Self::WrongSymbolAfterBody => "STOMP_WRONG_SYMBOL_AFTER_BODY",
        }
    }
}

impl fmt::Display for StompError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::error::Error for StompError {}

// ============================================
// FRAME
// ============================================

pub type StompHeaders = BTreeMap<StompHeader, String>;

/// A validated STOMP 1.2 frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StompFrame {
    command: StompCommand,
    headers: StompHeaders,
    body: String,
}

impl StompFrame {
    /// Build a frame from its parts.
    ///
    /// The parts are serialized and parsed back, so a header value holding a
    /// newline or a body holding NUL is rejected exactly as it would be on
    /// the wire.
    pub fn new(
        command: StompCommand,
        headers: StompHeaders,
        body: impl Into<String>,
    ) -> Result<Self, StompError> {
        let wire = serialize(command, &headers, &body.into());
        Self::parse(&wire)
    }

    /// Parse a frame received from the wire
    pub fn parse(frame: &str) -> Result<Self, StompError> {
        let bytes = frame.as_bytes();

        // Command
        let command_end = find_byte(bytes, NEW_LINE, 0).ok_or(StompError::HeaderEmpty)?;
        let command: StompCommand = frame[..command_end].parse()?;

        // Headers
        let mut headers = StompHeaders::new();
        let mut header_start = command_end + 1;
        while header_start < bytes.len() && bytes[header_start] != NEW_LINE {
            let header_end = find_byte(bytes, NEW_LINE, header_start)
                .ok_or(StompError::HeaderMissingNewLine)?;
            let line = &frame[header_start..header_end];

            let colon = find_byte(line.as_bytes(), COLON, 0)
                .ok_or(StompError::HeaderMissingColon)?;
            if colon + 1 == line.len() {
                return Err(StompError::HeaderEmptyValue);
            }

            let key: StompHeader = line[..colon].parse()?;
            headers
                .entry(key)
                .or_insert_with(|| line[colon + 1..].to_string());

            header_start = header_end + 1;
        }
        if header_start >= bytes.len() {
            return Err(StompError::BodyNoNewLine);
        }

        // Body
        let body_start = header_start + 1;
        let remaining = bytes.len() - body_start;
        let body_end = match headers.get(&StompHeader::ContentLength) {
            Some(value) => {
                let length: usize = value
                    .parse()
                    .map_err(|_| StompError::HeaderContentLength)?;
                if length == remaining {
                    return Err(StompError::BodyMissingNull);
                }
                if length > remaining {
                    return Err(StompError::BodyLength);
                }
                let end = body_start + length;
                if bytes[end] != NULL {
                    return Err(StompError::BodyMissingNull);
                }
                end
            }
            None => find_byte(bytes, NULL, body_start).ok_or(StompError::BodyMissingNull)?,
        };
        if bytes[body_end + 1..].iter().any(|&b| b != NEW_LINE) {
            return Err(StompError::WrongSymbolAfterBody);
        }
        let body = frame
            .get(body_start..body_end)
            .ok_or(StompError::BodyLength)?
            .to_string();

        validate(command, &headers, &body)?;

        Ok(Self {
            command,
            headers,
            body,
        })
    }

    pub fn command(&self) -> StompCommand {
        self.command
    }

    /// Header value, or an empty string when the header is absent
    pub fn header(&self, header: StompHeader) -> &str {
        self.headers.get(&header).map(String::as_str).unwrap_or("")
    }

    pub fn has_header(&self, header: StompHeader) -> bool {
        self.headers.contains_key(&header)
    }

    pub fn headers(&self) -> &StompHeaders {
        &self.headers
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Wire representation, NUL terminated
    pub fn to_wire(&self) -> String {
        serialize(self.command, &self.headers, &self.body)
    }
}

impl fmt::Display for StompFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

/// Convenience builder for outgoing frames
#[derive(Debug, Clone)]
pub struct StompFrameBuilder {
    command: StompCommand,
    headers: StompHeaders,
    body: String,
}

impl StompFrameBuilder {
    pub fn new(command: StompCommand) -> Self {
        Self {
            command,
            headers: StompHeaders::new(),
            body: String::new(),
        }
    }

    pub fn header(mut self, header: StompHeader, value: impl Into<String>) -> Self {
        self.headers.insert(header, value.into());
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn build(self) -> Result<StompFrame, StompError> {
        StompFrame::new(self.command, self.headers, self.body)
    }
}

fn serialize(command: StompCommand, headers: &StompHeaders, body: &str) -> String {
    let mut frame = String::with_capacity(64 + body.len());
    frame.push_str(command.as_str());
    frame.push('\n');
    for (header, value) in headers {
        frame.push_str(header.as_str());
        frame.push(':');
        frame.push_str(value);
        frame.push('\n');
    }
    frame.push('\n');
    frame.push_str(body);
    frame.push('\0');
    frame
}

fn validate(command: StompCommand, headers: &StompHeaders, body: &str) -> Result<(), StompError> {
    if command
        .required_headers()
        .iter()
        .any(|header| !headers.contains_key(header))
    {
        return Err(StompError::HeaderMissing);
    }

    if let Some(value) = headers.get(&StompHeader::ContentLength) {
        let length: usize = value
            .parse()
            .map_err(|_| StompError::HeaderContentLength)?;
        if length != body.len() {
            return Err(StompError::BodyLength);
        }
    }

    Ok(())
}

#[inline]
fn find_byte(haystack: &[u8], needle: u8, from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .iter()
        .position(|&b| b == needle)
        .map(|pos| pos + from)
}
