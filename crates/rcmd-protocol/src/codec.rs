//! Tokio codec for the client-to-server login stream
//!
//! After the handshake, everything the login client sends is terminal input,
//! except for window-size records injected at arbitrary points. This decoder
//! separates the two.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::Decoder;

use crate::error::ProtocolError;
use crate::window::{WindowSize, WINDOW_SIZE_MAGIC, WINDOW_SIZE_MESSAGE_LEN};

/// One unit of the login stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginStreamItem {
    /// Terminal input, passed through verbatim
    Data(Bytes),
    /// The client's terminal changed size
    Resize(WindowSize),
}

/// Decoder splitting terminal input from window-size records
#[derive(Debug, Default)]
pub struct LoginStreamCodec;

impl LoginStreamCodec {
    /// Create a new codec
    pub fn new() -> Self {
        Self
    }
}

/// Position of the first possible record start after index 0
///
/// A trailing partial marker counts as a possible start so it is held back
/// until the next read decides it.
fn next_marker(src: &[u8]) -> usize {
    (1..src.len())
        .find(|&i| {
            let rest = &src[i..];
            if rest.len() >= WINDOW_SIZE_MAGIC.len() {
                rest.starts_with(&WINDOW_SIZE_MAGIC)
            } else {
                WINDOW_SIZE_MAGIC.starts_with(rest)
            }
        })
        .unwrap_or(src.len())
}

impl Decoder for LoginStreamCodec {
    type Item = LoginStreamItem;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        if src.len() >= WINDOW_SIZE_MAGIC.len() {
            if src.starts_with(&WINDOW_SIZE_MAGIC) {
                if src.len() < WINDOW_SIZE_MESSAGE_LEN {
                    return Ok(None); // Need the rest of the record
                }
                return Ok(WindowSize::decode(src).map(LoginStreamItem::Resize));
            }
        } else if WINDOW_SIZE_MAGIC.starts_with(&src[..]) {
            return Ok(None); // Could still become a record
        }

        let end = next_marker(src);
        Ok(Some(LoginStreamItem::Data(src.split_to(end).freeze())))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(item) => Ok(Some(item)),
            // A dangling partial marker is just data once the stream ends
            None if !src.is_empty() => {
                let rest = src.split_to(src.len()).freeze();
                Ok(Some(LoginStreamItem::Data(rest)))
            }
            None => Ok(None),
        }
    }
}
