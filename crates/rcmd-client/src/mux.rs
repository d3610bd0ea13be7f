//! Forwarding loops
//!
//! Each session relays bytes between local streams and the connection until
//! any channel reports end-of-stream (a clean end) or an error. A single
//! `select!` is the only place the loop waits.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use rcmd_core::{RcmdError, TerminalControl};

use crate::signal::SignalBridge;

/// Bytes read per readiness event
pub const CHUNK_SIZE: usize = 4096;

/// Which channel ended the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Closed {
    /// Local input reached end-of-file
    Input,
    /// The server closed the primary connection
    Connection,
    /// The server closed the error stream
    Errors,
}

async fn read_optional<R>(reader: &mut Option<R>, buf: &mut [u8]) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    match reader {
        Some(reader) => reader.read(buf).await,
        None => std::future::pending().await,
    }
}

async fn forward<W>(writer: &mut W, data: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(data).await?;
    writer.flush().await
}

/// Relay a login session
///
/// The terminal is put into raw mode for the duration of the loop and
/// restored on every exit path. Every notification from `resize` sends the
/// current window size as a 12-byte record ahead of pending input; the
/// bridge's initial token produces the first record.
pub async fn login<S, I, O, T>(
    socket: S,
    input: I,
    mut output: O,
    terminal: &T,
    resize: &mut SignalBridge,
) -> Result<Closed, RcmdError>
where
    S: AsyncRead + AsyncWrite,
    I: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
    T: TerminalControl,
{
    let _raw_mode = terminal.enter_raw_mode()?;

    let (mut from_server, mut to_server) = tokio::io::split(socket);
    let mut input = Some(input);
    let mut local_buf = vec![0u8; CHUNK_SIZE];
    let mut remote_buf = vec![0u8; CHUNK_SIZE];

    loop {
        tokio::select! {
            biased;

            notified = resize.notified() => {
                notified?;
                let size = terminal.window_size()?;
                tracing::debug!(rows = size.rows, cols = size.cols, "Sending window size");
                forward(&mut to_server, &size.to_bytes()).await?;
            }

            result = read_optional(&mut input, &mut local_buf) => {
                let n = result?;
                if n == 0 {
                    tracing::debug!("Local input closed");
                    return Ok(Closed::Input);
                }
                forward(&mut to_server, &local_buf[..n]).await?;
            }

            result = from_server.read(&mut remote_buf) => {
                let n = result?;
                if n == 0 {
                    tracing::debug!("Connection closed by server");
                    return Ok(Closed::Connection);
                }
                forward(&mut output, &remote_buf[..n]).await?;
            }
        }
    }
}

/// Relay a shell session
///
/// Three independent channels: `input` to the connection, the connection
/// to `output`, and the error stream to `errors`. A missing `input` (the
/// `-n` option) or a missing error stream simply leaves that channel out.
pub async fn shell<S, A, I, O, E>(
    socket: S,
    auxiliary: Option<A>,
    input: Option<I>,
    mut output: O,
    mut errors: E,
) -> Result<Closed, RcmdError>
where
    S: AsyncRead + AsyncWrite,
    A: AsyncRead + Unpin,
    I: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    let (mut from_server, mut to_server) = tokio::io::split(socket);
    let mut auxiliary = auxiliary;
    let mut input = input;
    let mut local_buf = vec![0u8; CHUNK_SIZE];
    let mut remote_buf = vec![0u8; CHUNK_SIZE];
    let mut error_buf = vec![0u8; CHUNK_SIZE];

    loop {
        tokio::select! {
            result = read_optional(&mut input, &mut local_buf) => {
                let n = result?;
                if n == 0 {
                    tracing::debug!("Local input closed");
                    return Ok(Closed::Input);
                }
                forward(&mut to_server, &local_buf[..n]).await?;
            }

            result = read_optional(&mut auxiliary, &mut error_buf) => {
                let n = result?;
                if n == 0 {
                    tracing::debug!("Error stream closed by server");
                    return Ok(Closed::Errors);
                }
                forward(&mut errors, &error_buf[..n]).await?;
            }

            result = from_server.read(&mut remote_buf) => {
                let n = result?;
                if n == 0 {
                    tracing::debug!("Connection closed by server");
                    return Ok(Closed::Connection);
                }
                forward(&mut output, &remote_buf[..n]).await?;
            }
        }
    }
}
