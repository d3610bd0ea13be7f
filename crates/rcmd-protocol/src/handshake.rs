//! Handshake messages
//!
//! Immediately after the TCP connection is established the client sends a
//! fixed sequence of NUL-terminated fields and waits for a one-byte answer:
//!
//! | Role  | Fields (in order)                                        |
//! |-------|----------------------------------------------------------|
//! | login | `""`, client user, server user, `terminal "/" speed`     |
//! | shell | stderr port, client user, server user, command           |
//!
//! The server answers with `0` on success. Any other byte means failure and
//! may be followed by a human-readable line.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::ProtocolError;

/// Maximum size of one field including its NUL terminator
pub const MAX_FIELD_LEN: usize = 1024;

/// Speed sent when the local terminal speed cannot be determined
pub const FALLBACK_SPEED: &str = "9600";

/// Acknowledgement byte meaning "accepted"
const ACK_ACCEPTED: u8 = 0;

/// Acknowledgement byte used for every server-side failure
const ACK_REJECTED: u8 = 1;

/// Login handshake sent by `rlogin`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRequest {
    /// User name on the client machine
    pub client_user: String,
    /// Account requested on the server
    pub server_user: String,
    /// Terminal type (e.g. `xterm`)
    pub terminal: String,
    /// Terminal speed as a decimal string (e.g. `38400`)
    pub speed: String,
}

impl LoginRequest {
    /// Create a new login request
    pub fn new(
        client_user: impl Into<String>,
        server_user: impl Into<String>,
        terminal: impl Into<String>,
        speed: impl Into<String>,
    ) -> Self {
        Self {
            client_user: client_user.into(),
            server_user: server_user.into(),
            terminal: terminal.into(),
            speed: speed.into(),
        }
    }

    /// The `terminal/speed` field as it appears on the wire
    pub fn terminal_field(&self) -> String {
        format!("{}/{}", self.terminal, self.speed)
    }

    /// Encode all four fields into the buffer
    pub fn encode(&self, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        put_field(dst, "", "empty")?;
        put_field(dst, &self.client_user, "client user")?;
        put_field(dst, &self.server_user, "server user")?;
        put_field(dst, &self.terminal_field(), "terminal")
    }

    /// Decode a complete login request
    ///
    /// Returns `Ok(None)` and leaves the buffer untouched if not all four
    /// fields have arrived yet.
    pub fn decode(src: &mut BytesMut) -> Result<Option<Self>, ProtocolError> {
        let Some((fields, consumed)) = split_fields::<4>(src)? else {
            return Ok(None);
        };

        if !fields[0].is_empty() {
            return Err(ProtocolError::UnexpectedField { field: "empty" });
        }
        let client_user = field_string(fields[1], "client user")?;
        let server_user = field_string(fields[2], "server user")?;
        let terminal_field = field_string(fields[3], "terminal")?;
        src.advance(consumed);

        let (terminal, speed) = split_terminal(&terminal_field);
        Ok(Some(Self {
            client_user,
            server_user,
            terminal,
            speed,
        }))
    }
}

/// Split `terminal/speed`, taking the last `/` as the separator
pub fn split_terminal(field: &str) -> (String, String) {
    match field.rsplit_once('/') {
        Some((terminal, speed)) => (terminal.to_string(), speed.to_string()),
        None => (field.to_string(), FALLBACK_SPEED.to_string()),
    }
}

/// Remote shell handshake sent by `rsh`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellRequest {
    /// Port the client listens on for the error stream, if any
    pub stderr_port: Option<u16>,
    /// User name on the client machine
    pub client_user: String,
    /// Account requested on the server
    pub server_user: String,
    /// Command line to run, words joined by single spaces
    pub command: String,
}

impl ShellRequest {
    /// Create a new shell request
    pub fn new(
        stderr_port: Option<u16>,
        client_user: impl Into<String>,
        server_user: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            stderr_port,
            client_user: client_user.into(),
            server_user: server_user.into(),
            command: command.into(),
        }
    }

    /// Build a request from individual command words
    pub fn from_words<S: AsRef<str>>(
        stderr_port: Option<u16>,
        client_user: impl Into<String>,
        server_user: impl Into<String>,
        words: &[S],
    ) -> Self {
        let command = words
            .iter()
            .map(|w| w.as_ref())
            .collect::<Vec<_>>()
            .join(" ");
        Self::new(stderr_port, client_user, server_user, command)
    }

    /// Encode all four fields into the buffer
    pub fn encode(&self, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        let port = self.stderr_port.map(|p| p.to_string()).unwrap_or_default();
        put_field(dst, &port, "stderr port")?;
        put_field(dst, &self.client_user, "client user")?;
        put_field(dst, &self.server_user, "server user")?;
        put_field(dst, &self.command, "command")
    }

    /// Decode a complete shell request
    ///
    /// Returns `Ok(None)` and leaves the buffer untouched if not all four
    /// fields have arrived yet.
    pub fn decode(src: &mut BytesMut) -> Result<Option<Self>, ProtocolError> {
        let Some((fields, consumed)) = split_fields::<4>(src)? else {
            return Ok(None);
        };

        let stderr_port = parse_stderr_port(&field_string(fields[0], "stderr port")?)?;
        let client_user = field_string(fields[1], "client user")?;
        let server_user = field_string(fields[2], "server user")?;
        let command = field_string(fields[3], "command")?;
        src.advance(consumed);

        Ok(Some(Self {
            stderr_port,
            client_user,
            server_user,
            command,
        }))
    }
}

/// Parse the stderr-port field
///
/// An empty field or `0` means no error channel was requested.
pub fn parse_stderr_port(field: &str) -> Result<Option<u16>, ProtocolError> {
    if field.is_empty() {
        return Ok(None);
    }
    let port: u16 = field
        .trim()
        .parse()
        .map_err(|_| ProtocolError::UnexpectedField {
            field: "stderr port",
        })?;
    Ok((port != 0).then_some(port))
}

/// Server answer to a handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
    /// Session accepted; data transfer starts
    Accepted,
    /// Session refused
    Rejected {
        /// Non-zero status byte
        code: u8,
        /// Diagnostic line sent after the status byte
        reason: Option<String>,
    },
}

impl Ack {
    /// A rejection with the standard status byte and a diagnostic line
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            code: ACK_REJECTED,
            reason: Some(reason.into()),
        }
    }

    /// Whether the session was accepted
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// Encode the status byte and, for rejections, the diagnostic line
    pub fn encode(&self, dst: &mut BytesMut) {
        match self {
            Self::Accepted => dst.put_u8(ACK_ACCEPTED),
            Self::Rejected { code, reason } => {
                // A zero code would read as success on the client.
                dst.put_u8(if *code == ACK_ACCEPTED { ACK_REJECTED } else { *code });
                if let Some(reason) = reason {
                    dst.extend_from_slice(reason.trim_end_matches('\n').as_bytes());
                    dst.put_u8(b'\n');
                }
            }
        }
    }

    /// Interpret a status byte, without any diagnostic
    pub fn from_code(code: u8) -> Self {
        if code == ACK_ACCEPTED {
            Self::Accepted
        } else {
            Self::Rejected { code, reason: None }
        }
    }
}

/// Append one NUL-terminated field
fn put_field(dst: &mut BytesMut, value: &str, field: &'static str) -> Result<(), ProtocolError> {
    if value.as_bytes().contains(&0) {
        return Err(ProtocolError::UnexpectedField { field });
    }
    if value.len() >= MAX_FIELD_LEN {
        return Err(ProtocolError::FrameTooLong { max: MAX_FIELD_LEN });
    }
    dst.reserve(value.len() + 1);
    dst.extend_from_slice(value.as_bytes());
    dst.put_u8(0);
    Ok(())
}

/// Find the end of one field starting at the beginning of `src`
///
/// Returns the field length (without terminator), `None` if more bytes are
/// needed, or `FrameTooLong` once `MAX_FIELD_LEN` bytes carry no NUL.
pub fn find_field_end(src: &[u8]) -> Result<Option<usize>, ProtocolError> {
    let window = &src[..src.len().min(MAX_FIELD_LEN)];
    match window.iter().position(|&b| b == 0) {
        Some(end) => Ok(Some(end)),
        None if window.len() >= MAX_FIELD_LEN => {
            Err(ProtocolError::FrameTooLong { max: MAX_FIELD_LEN })
        }
        None => Ok(None),
    }
}

/// Locate `N` consecutive fields without consuming anything
fn split_fields<const N: usize>(
    src: &BytesMut,
) -> Result<Option<([&[u8]; N], usize)>, ProtocolError> {
    let mut fields: [&[u8]; N] = [&[][..]; N];
    let mut offset = 0;

    for slot in fields.iter_mut() {
        let rest = &src[offset..];
        let Some(end) = find_field_end(rest)? else {
            return Ok(None);
        };
        *slot = &rest[..end];
        offset += end + 1;
    }

    Ok(Some((fields, offset)))
}

/// Convert raw field bytes to a string
pub(crate) fn field_string(raw: &[u8], field: &'static str) -> Result<String, ProtocolError> {
    String::from_utf8(raw.to_vec()).map_err(|_| ProtocolError::InvalidEncoding { field })
}
