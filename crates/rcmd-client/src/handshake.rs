//! Client side of the handshake

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncWrite};

use rcmd_core::RcmdError;
use rcmd_protocol::io::{read_ack, write_all};
use rcmd_protocol::{Ack, LoginRequest, ProtocolError, ShellRequest};

/// Send a login request and wait for the acknowledgement
pub async fn login<S>(stream: &mut S, request: &LoginRequest) -> Result<(), RcmdError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = BytesMut::new();
    request.encode(&mut buf)?;
    write_all(stream, &buf).await?;
    tracing::debug!(
        server_user = %request.server_user,
        terminal = %request.terminal_field(),
        "Sent login request"
    );
    expect_ack(stream).await
}

/// Send a shell request and wait for the acknowledgement
pub async fn shell<S>(stream: &mut S, request: &ShellRequest) -> Result<(), RcmdError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = BytesMut::new();
    request.encode(&mut buf)?;
    write_all(stream, &buf).await?;
    tracing::debug!(
        server_user = %request.server_user,
        stderr_port = ?request.stderr_port,
        "Sent shell request"
    );
    expect_ack(stream).await
}

/// Read the acknowledgement byte
///
/// Anything but a zero byte, including no byte at all, is a rejection.
pub async fn expect_ack<S>(stream: &mut S) -> Result<(), RcmdError>
where
    S: AsyncRead + Unpin,
{
    match read_ack(stream).await {
        Ok(Ack::Accepted) => Ok(()),
        Ok(Ack::Rejected { code, reason }) => Err(RcmdError::HandshakeRejected {
            code: Some(code),
            reason,
        }),
        Err(ProtocolError::PeerClosed) => Err(RcmdError::HandshakeRejected {
            code: None,
            reason: None,
        }),
        Err(e) => Err(e.into()),
    }
}
