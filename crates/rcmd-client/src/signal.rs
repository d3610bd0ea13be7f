//! Window-resize notification bridge
//!
//! `SIGWINCH` is turned into a readable event on a private socket pair. The
//! handler installed by `signal-hook` only writes one byte to the write end;
//! the multiplexer waits on the read end like on any other descriptor.

use std::io::{self, Read, Write};
use std::os::raw::c_int;
use std::os::unix::net::UnixStream as StdUnixStream;

use signal_hook::consts::SIGWINCH;
use signal_hook::SigId;
use tokio::net::UnixStream;

/// Self-pipe carrying resize notifications to the event loop
pub struct SignalBridge {
    receiver: UnixStream,
    pending: StdUnixStream,
    sender: StdUnixStream,
    registration: Option<SigId>,
}

impl SignalBridge {
    /// Bridge `SIGWINCH`
    pub fn resize() -> io::Result<Self> {
        Self::for_signal(SIGWINCH)
    }

    /// Bridge an arbitrary signal
    pub fn for_signal(signal: c_int) -> io::Result<Self> {
        let mut bridge = Self::unregistered()?;
        let handler_end = bridge.sender.try_clone()?;
        let id = signal_hook::low_level::pipe::register(signal, handler_end)?;
        bridge.registration = Some(id);
        tracing::debug!(signal, "Signal bridge registered");
        Ok(bridge)
    }

    /// A bridge fed only through [`post`](Self::post)
    ///
    /// Like the registered variant it starts with one pending token.
    pub fn unregistered() -> io::Result<Self> {
        let (read_end, write_end) = StdUnixStream::pair()?;
        read_end.set_nonblocking(true)?;
        write_end.set_nonblocking(true)?;

        let bridge = Self {
            pending: read_end.try_clone()?,
            receiver: UnixStream::from_std(read_end)?,
            sender: write_end,
            registration: None,
        };
        bridge.post();
        Ok(bridge)
    }

    /// Queue a wake-up token
    ///
    /// A full buffer already holds a pending token, so a failed write loses
    /// nothing.
    pub fn post(&self) {
        let _ = (&self.sender).write(&[1]);
    }

    /// A handle that posts tokens while the bridge itself is borrowed
    pub fn notifier(&self) -> io::Result<Notifier> {
        Ok(Notifier {
            sender: self.sender.try_clone()?,
        })
    }

    /// Wait for at least one token, then drain all pending ones
    ///
    /// Tokens already queued are consumed on the first poll, before the
    /// reactor has reported the socket readable. Cancel safe: tokens are only
    /// consumed in a poll that completes.
    pub async fn notified(&mut self) -> io::Result<()> {
        let mut pending = &self.pending;
        if drain(|buf| pending.read(buf))? {
            return Ok(());
        }

        loop {
            self.receiver.readable().await?;
            let receiver = &self.receiver;
            if drain(|buf| receiver.try_read(buf))? {
                return Ok(());
            }
        }
    }
}

/// Read until the socket would block; true if any token was read
fn drain<F>(mut read: F) -> io::Result<bool>
where
    F: FnMut(&mut [u8]) -> io::Result<usize>,
{
    let mut scratch = [0u8; 64];
    let mut received = false;
    loop {
        match read(&mut scratch) {
            Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
            Ok(_) => received = true,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(received),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Posts tokens to a [`SignalBridge`]
#[derive(Debug)]
pub struct Notifier {
    sender: StdUnixStream,
}

impl Notifier {
    /// Queue a wake-up token
    pub fn post(&self) {
        let _ = (&self.sender).write(&[1]);
    }
}

impl Drop for SignalBridge {
    fn drop(&mut self) {
        if let Some(id) = self.registration.take() {
            signal_hook::low_level::unregister(id);
        }
    }
}
