//! Window-size record
//!
//! The login client injects a 12-byte record into its data stream whenever
//! the local terminal changes size:
//! - marker: `0xFF 0xFF`
//! - tag: `'s' 's'`
//! - rows, columns, x pixels, y pixels: 4 x u16, big-endian
//!
//! Ordinary terminal data that happens to contain the same four leading
//! bytes cannot be told apart from a genuine record. Existing peers rely on
//! this framing, so it is kept as is.

use bytes::{Buf, BufMut, BytesMut};

/// Size of the record in bytes
pub const WINDOW_SIZE_MESSAGE_LEN: usize = 12;

/// Leading marker and tag of the record
pub const WINDOW_SIZE_MAGIC: [u8; 4] = [0xFF, 0xFF, b's', b's'];

/// Terminal dimensions carried by the record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    /// Number of rows
    pub rows: u16,
    /// Number of columns
    pub cols: u16,
    /// Width in pixels (0 if unknown)
    pub x_pixels: u16,
    /// Height in pixels (0 if unknown)
    pub y_pixels: u16,
}

impl WindowSize {
    /// Create a window size with unknown pixel dimensions
    pub fn new(rows: u16, cols: u16) -> Self {
        Self {
            rows,
            cols,
            x_pixels: 0,
            y_pixels: 0,
        }
    }

    /// Set the pixel dimensions
    pub fn with_pixels(mut self, x_pixels: u16, y_pixels: u16) -> Self {
        self.x_pixels = x_pixels;
        self.y_pixels = y_pixels;
        self
    }

    /// Default terminal size (24x80)
    pub fn default_size() -> Self {
        Self::new(24, 80)
    }

    /// Encode the full record into a byte buffer
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(WINDOW_SIZE_MESSAGE_LEN);
        dst.extend_from_slice(&WINDOW_SIZE_MAGIC);
        dst.put_u16(self.rows);
        dst.put_u16(self.cols);
        dst.put_u16(self.x_pixels);
        dst.put_u16(self.y_pixels);
    }

    /// The record as a fixed array, for writing as one unit
    pub fn to_bytes(&self) -> [u8; WINDOW_SIZE_MESSAGE_LEN] {
        let mut out = [0u8; WINDOW_SIZE_MESSAGE_LEN];
        out[..4].copy_from_slice(&WINDOW_SIZE_MAGIC);
        out[4..6].copy_from_slice(&self.rows.to_be_bytes());
        out[6..8].copy_from_slice(&self.cols.to_be_bytes());
        out[8..10].copy_from_slice(&self.x_pixels.to_be_bytes());
        out[10..12].copy_from_slice(&self.y_pixels.to_be_bytes());
        out
    }

    /// Decode a record from the front of the buffer
    ///
    /// Returns None if the buffer does not start with a complete record.
    pub fn decode(src: &mut BytesMut) -> Option<Self> {
        if src.len() < WINDOW_SIZE_MESSAGE_LEN || !src.starts_with(&WINDOW_SIZE_MAGIC) {
            return None;
        }

        src.advance(WINDOW_SIZE_MAGIC.len());
        Some(Self {
            rows: src.get_u16(),
            cols: src.get_u16(),
            x_pixels: src.get_u16(),
            y_pixels: src.get_u16(),
        })
    }
}

impl Default for WindowSize {
    fn default() -> Self {
        Self::default_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_bytes() {
        let size = WindowSize::new(40, 100);
        assert_eq!(
            size.to_bytes(),
            [0xFF, 0xFF, 0x73, 0x73, 0x00, 0x28, 0x00, 0x64, 0x00, 0x00, 0x00, 0x00]
        );

        let mut buf = BytesMut::new();
        size.encode(&mut buf);
        assert_eq!(&buf[..], &size.to_bytes()[..]);
    }

    #[test]
    fn test_record_with_pixels() {
        let size = WindowSize::new(50, 132).with_pixels(1056, 800);

        let mut buf = BytesMut::new();
        size.encode(&mut buf);

        let decoded = WindowSize::decode(&mut buf).unwrap();
        assert_eq!(decoded, size);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_needs_full_record() {
        let mut buf = BytesMut::from(&WindowSize::new(24, 80).to_bytes()[..11]);
        assert!(WindowSize::decode(&mut buf).is_none());
        assert_eq!(buf.len(), 11);
    }

    #[test]
    fn test_decode_requires_marker() {
        let mut buf = BytesMut::from(&b"hello, world"[..]);
        assert!(WindowSize::decode(&mut buf).is_none());
    }

    #[test]
    fn test_default_size() {
        let size = WindowSize::default();
        assert_eq!(size.rows, 24);
        assert_eq!(size.cols, 80);
    }
}
