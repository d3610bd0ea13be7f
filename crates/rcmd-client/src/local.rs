//! Local standard streams as async readers and writers
//!
//! Terminals, pipes and sockets are registered with the reactor and switched
//! to non-blocking mode for the lifetime of the stream. Regular files and
//! character devices such as `/dev/null` cannot be registered (`EPERM`), but
//! they never block either, so they are accessed directly.

use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use tokio::io::unix::AsyncFd;
use tokio::io::{AsyncRead, AsyncWrite, Interest, ReadBuf};

/// Borrowed standard descriptor; never closed by us
#[derive(Debug)]
struct StdioFd(RawFd);

impl AsRawFd for StdioFd {
    fn as_raw_fd(&self) -> RawFd {
        self.0
    }
}

/// Sets `O_NONBLOCK` and clears it again on drop if it was not set before
#[derive(Debug)]
struct NonBlocking {
    fd: RawFd,
    restore: bool,
}

impl NonBlocking {
    fn enable(fd: RawFd) -> io::Result<Self> {
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
        if flags < 0 {
            return Err(io::Error::last_os_error());
        }
        if flags & libc::O_NONBLOCK != 0 {
            return Ok(Self { fd, restore: false });
        }
        if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { fd, restore: true })
    }
}

impl Drop for NonBlocking {
    fn drop(&mut self) {
        if !self.restore {
            return;
        }
        unsafe {
            let flags = libc::fcntl(self.fd, libc::F_GETFL);
            if flags >= 0 {
                libc::fcntl(self.fd, libc::F_SETFL, flags & !libc::O_NONBLOCK);
            }
        }
    }
}

/// One of the process's standard streams
#[derive(Debug)]
pub struct LocalStream {
    inner: Inner,
}

#[derive(Debug)]
enum Inner {
    /// Registered with the reactor
    Polled {
        io: AsyncFd<StdioFd>,
        _mode: NonBlocking,
    },
    /// Always ready; read and written directly
    Plain(RawFd),
}

impl LocalStream {
    /// Standard input
    pub fn stdin() -> io::Result<Self> {
        Self::open(libc::STDIN_FILENO, Interest::READABLE)
    }

    /// Standard output
    pub fn stdout() -> io::Result<Self> {
        Self::open(libc::STDOUT_FILENO, Interest::WRITABLE)
    }

    /// Standard error
    pub fn stderr() -> io::Result<Self> {
        Self::open(libc::STDERR_FILENO, Interest::WRITABLE)
    }

    fn open(fd: RawFd, interest: Interest) -> io::Result<Self> {
        let mode = NonBlocking::enable(fd)?;
        match AsyncFd::with_interest(StdioFd(fd), interest) {
            Ok(io) => Ok(Self {
                inner: Inner::Polled { io, _mode: mode },
            }),
            Err(e) if e.raw_os_error() == Some(libc::EPERM) => {
                drop(mode);
                tracing::debug!(fd, "Descriptor is not pollable, using direct I/O");
                Ok(Self {
                    inner: Inner::Plain(fd),
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Whether the stream goes through the reactor
    pub fn is_polled(&self) -> bool {
        matches!(self.inner, Inner::Polled { .. })
    }
}

fn raw_read(fd: RawFd, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        let n = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
        if n >= 0 {
            return Ok(n as usize);
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

fn raw_write(fd: RawFd, buf: &[u8]) -> io::Result<usize> {
    loop {
        let n = unsafe { libc::write(fd, buf.as_ptr().cast(), buf.len()) };
        if n >= 0 {
            return Ok(n as usize);
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

impl AsyncRead for LocalStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut self.get_mut().inner {
            Inner::Polled { io, .. } => loop {
                let mut guard = ready!(io.poll_read_ready(cx))?;
                let unfilled = buf.initialize_unfilled();
                match guard.try_io(|inner| raw_read(inner.as_raw_fd(), unfilled)) {
                    Ok(Ok(n)) => {
                        buf.advance(n);
                        return Poll::Ready(Ok(()));
                    }
                    Ok(Err(e)) => return Poll::Ready(Err(e)),
                    Err(_would_block) => continue,
                }
            },
            Inner::Plain(fd) => {
                let n = raw_read(*fd, buf.initialize_unfilled())?;
                buf.advance(n);
                Poll::Ready(Ok(()))
            }
        }
    }
}

impl AsyncWrite for LocalStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut self.get_mut().inner {
            Inner::Polled { io, .. } => loop {
                let mut guard = ready!(io.poll_write_ready(cx))?;
                match guard.try_io(|inner| raw_write(inner.as_raw_fd(), buf)) {
                    Ok(result) => return Poll::Ready(result),
                    Err(_would_block) => continue,
                }
            },
            Inner::Plain(fd) => Poll::Ready(raw_write(*fd, buf)),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonblocking_guard_restores_flags() {
        let (a, _b) = std::os::unix::net::UnixStream::pair().unwrap();
        let fd = a.as_raw_fd();
        let flags = || unsafe { libc::fcntl(fd, libc::F_GETFL) };

        assert_eq!(flags() & libc::O_NONBLOCK, 0);
        {
            let _guard = NonBlocking::enable(fd).unwrap();
            assert_ne!(flags() & libc::O_NONBLOCK, 0);

            // Already non-blocking: the inner guard must not clear the flag
            let inner = NonBlocking::enable(fd).unwrap();
            drop(inner);
            assert_ne!(flags() & libc::O_NONBLOCK, 0);
        }
        assert_eq!(flags() & libc::O_NONBLOCK, 0);
    }

    #[test]
    fn test_raw_io_on_pipe() {
        let (a, b) = std::os::unix::net::UnixStream::pair().unwrap();
        assert_eq!(raw_write(a.as_raw_fd(), b"ping").unwrap(), 4);

        let mut buf = [0u8; 8];
        let n = raw_read(b.as_raw_fd(), &mut buf).unwrap();
        assert_eq!(&buf[..n], b"ping");
    }
}
