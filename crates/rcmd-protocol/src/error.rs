//! Protocol error types

use thiserror::Error;

/// Errors that can occur while encoding or decoding handshake data
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A field ran past the maximum length without a NUL terminator
    #[error("Handshake field exceeds {max} bytes without a terminator")]
    FrameTooLong { max: usize },

    /// The connection ended in the middle of the handshake
    #[error("Peer closed the connection during the handshake")]
    PeerClosed,

    /// A field had a value the protocol does not allow
    #[error("Unexpected value in handshake field '{field}'")]
    UnexpectedField { field: &'static str },

    /// A field is not valid UTF-8
    #[error("Handshake field '{field}' is not valid UTF-8")]
    InvalidEncoding { field: &'static str },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
