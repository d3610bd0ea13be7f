//! rcmd-protocol: Wire protocol for the BSD remote login / remote shell services
//!
//! This crate defines the byte-level formats exchanged between the `rlogin`
//! and `rsh` clients and their servers:
//!
//! - the NUL-delimited handshake fields sent by the client,
//! - the single-byte acknowledgement returned by the server,
//! - the 12-byte out-of-band window-size record interleaved in a login stream.

pub mod codec;
pub mod error;
pub mod handshake;
pub mod io;
pub mod window;

pub use codec::{LoginStreamCodec, LoginStreamItem};
pub use error::ProtocolError;
pub use handshake::{Ack, LoginRequest, ShellRequest, FALLBACK_SPEED, MAX_FIELD_LEN};
pub use window::{WindowSize, WINDOW_SIZE_MAGIC, WINDOW_SIZE_MESSAGE_LEN};
