//! Async helpers for reading and writing handshake data on a live socket
//!
//! Fields are read one byte at a time: whatever follows the handshake belongs
//! to the session, and on the server side the session program inherits the
//! socket, so nothing past the final NUL may be buffered here.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ProtocolError;
use crate::handshake::{field_string, Ack, MAX_FIELD_LEN};

/// Read one NUL-terminated field of at most `max` bytes (terminator included)
///
/// Fails with `FrameTooLong` once `max` bytes arrive without a NUL, and with
/// `PeerClosed` if the connection ends first.
pub async fn read_field<R>(reader: &mut R, max: usize) -> Result<Vec<u8>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut field = Vec::new();
    let mut byte = [0u8; 1];

    while field.len() < max {
        if reader.read(&mut byte).await? == 0 {
            return Err(ProtocolError::PeerClosed);
        }
        if byte[0] == 0 {
            return Ok(field);
        }
        field.push(byte[0]);
    }

    Err(ProtocolError::FrameTooLong { max })
}

/// Read one field as a UTF-8 string, using the standard size limit
pub async fn read_string<R>(reader: &mut R, field: &'static str) -> Result<String, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let raw = read_field(reader, MAX_FIELD_LEN).await?;
    let value = field_string(&raw, field)?;
    tracing::trace!(field, value = %value, "Received handshake field");
    Ok(value)
}

/// Read the server's acknowledgement
///
/// A non-zero status byte is followed by an optional diagnostic line, which
/// is read up to the newline, end of stream, or the field size limit.
pub async fn read_ack<R>(reader: &mut R) -> Result<Ack, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut code = [0u8; 1];
    if reader.read(&mut code).await? == 0 {
        return Err(ProtocolError::PeerClosed);
    }

    let ack = Ack::from_code(code[0]);
    let Ack::Rejected { code, .. } = ack else {
        return Ok(ack);
    };

    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    while line.len() < MAX_FIELD_LEN {
        match reader.read(&mut byte).await {
            Ok(0) | Err(_) => break,
            Ok(_) if byte[0] == b'\n' => break,
            Ok(_) => line.push(byte[0]),
        }
    }

    let reason = String::from_utf8_lossy(&line).trim().to_string();
    Ok(Ack::Rejected {
        code,
        reason: (!reason.is_empty()).then_some(reason),
    })
}

/// Write an encoded message completely
///
/// Short writes are retried until every byte is out or a hard error occurs.
pub async fn write_all<W>(writer: &mut W, buf: &BytesMut) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Encode and write an acknowledgement
pub async fn write_ack<W>(writer: &mut W, ack: &Ack) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = BytesMut::new();
    ack.encode(&mut buf);
    write_all(writer, &buf).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handshake::LoginRequest;

    #[tokio::test]
    async fn test_read_field_stops_at_terminator() {
        let mut input: &[u8] = b"alice\0rest";
        let field = read_field(&mut input, MAX_FIELD_LEN).await.unwrap();
        assert_eq!(field, b"alice");
        // Nothing past the terminator was consumed
        assert_eq!(input, b"rest");
    }

    #[tokio::test]
    async fn test_read_field_boundary() {
        let mut ok = vec![b'a'; MAX_FIELD_LEN - 1];
        ok.push(0);
        let mut input: &[u8] = &ok;
        let field = read_field(&mut input, MAX_FIELD_LEN).await.unwrap();
        assert_eq!(field.len(), MAX_FIELD_LEN - 1);

        let too_long = vec![b'a'; MAX_FIELD_LEN];
        let mut input: &[u8] = &too_long;
        assert!(matches!(
            read_field(&mut input, MAX_FIELD_LEN).await,
            Err(ProtocolError::FrameTooLong { max: MAX_FIELD_LEN })
        ));
    }

    #[tokio::test]
    async fn test_read_field_peer_closed() {
        let mut input: &[u8] = b"ali";
        assert!(matches!(
            read_field(&mut input, MAX_FIELD_LEN).await,
            Err(ProtocolError::PeerClosed)
        ));
    }

    #[tokio::test]
    async fn test_read_fields_of_login_request() {
        let mut buf = BytesMut::new();
        LoginRequest::new("alice", "bob", "xterm", "9600")
            .encode(&mut buf)
            .unwrap();
        let mut input: &[u8] = &buf;

        assert_eq!(read_string(&mut input, "empty").await.unwrap(), "");
        assert_eq!(read_string(&mut input, "client user").await.unwrap(), "alice");
        assert_eq!(read_string(&mut input, "server user").await.unwrap(), "bob");
        assert_eq!(
            read_string(&mut input, "terminal").await.unwrap(),
            "xterm/9600"
        );
    }

    #[tokio::test]
    async fn test_read_ack_accepted() {
        let mut input: &[u8] = &[0, b'x'];
        assert_eq!(read_ack(&mut input).await.unwrap(), Ack::Accepted);
        assert_eq!(input, b"x");
    }

    #[tokio::test]
    async fn test_read_ack_rejected_with_reason() {
        let mut input: &[u8] = b"\x01Authentication failure\n";
        assert_eq!(
            read_ack(&mut input).await.unwrap(),
            Ack::rejected("Authentication failure")
        );
    }

    #[tokio::test]
    async fn test_read_ack_rejected_without_reason() {
        let mut input: &[u8] = &[7];
        assert_eq!(
            read_ack(&mut input).await.unwrap(),
            Ack::Rejected {
                code: 7,
                reason: None
            }
        );
    }

    #[tokio::test]
    async fn test_read_ack_eof() {
        let mut input: &[u8] = &[];
        assert!(matches!(
            read_ack(&mut input).await,
            Err(ProtocolError::PeerClosed)
        ));
    }

    #[tokio::test]
    async fn test_write_ack() {
        let (mut client, mut server) = tokio::io::duplex(64);
        write_ack(&mut server, &Ack::rejected("Permission denied"))
            .await
            .unwrap();
        drop(server);

        assert_eq!(
            read_ack(&mut client).await.unwrap(),
            Ack::rejected("Permission denied")
        );
    }
}
