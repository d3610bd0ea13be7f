//! Login sessions on a pseudo-terminal
//!
//! `rlogind` starts the account's shell on a PTY and relays between the
//! connection and the PTY master. Window-size records from the client are
//! split out of the input stream and applied to the PTY.

use std::io::{self, Read, Write};
use std::path::Path;

use futures::StreamExt;
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;

use rcmd_core::{RcmdError, SessionDetail};
use rcmd_protocol::{LoginStreamCodec, LoginStreamItem, WindowSize};

use crate::acceptor::Accepted;
use crate::account::Account;

/// Bytes read from the PTY per chunk
const CHUNK_SIZE: usize = 4096;

/// PTY output chunks buffered between the reader thread and the relay
const OUTPUT_QUEUE: usize = 64;

/// Arguments that start the account's shell as a login shell
const LOGIN_SHELL_ARGS: &[&str] = &["-l"];

/// Which side ended the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ended {
    /// The client closed the connection
    Client,
    /// The program on the PTY exited
    Program,
}

fn pty_error(what: &str, e: anyhow::Error) -> RcmdError {
    RcmdError::IoFailure(io::Error::new(io::ErrorKind::Other, format!("{}: {:#}", what, e)))
}

fn pty_size(size: WindowSize) -> PtySize {
    PtySize {
        rows: size.rows,
        cols: size.cols,
        pixel_width: size.x_pixels,
        pixel_height: size.y_pixels,
    }
}

/// A program running on a PTY
pub struct PtySession {
    master: Box<dyn MasterPty + Send>,
    child: Box<dyn Child + Send + Sync>,
    writer: Box<dyn Write + Send>,
    output: mpsc::Receiver<Vec<u8>>,
}

impl PtySession {
    /// Start `program` on a new PTY of the given size
    ///
    /// The environment is exactly `env`; nothing is inherited.
    pub fn spawn(
        program: &Path,
        args: &[&str],
        env: &[(String, String)],
        cwd: &Path,
        size: WindowSize,
    ) -> Result<Self, RcmdError> {
        let pair = native_pty_system()
            .openpty(pty_size(size))
            .map_err(|e| pty_error("Failed to open PTY", e))?;

        let mut cmd = CommandBuilder::new(program);
        cmd.args(args);
        cmd.env_clear();
        for (key, value) in env {
            cmd.env(key, value);
        }
        cmd.cwd(cwd);

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| pty_error("Failed to spawn program", e))?;
        // Only the child may hold the slave, so the master sees its exit
        drop(pair.slave);
        tracing::info!(program = %program.display(), pid = ?child.process_id(), "Spawned program on PTY");

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| pty_error("Failed to clone PTY reader", e))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| pty_error("Failed to take PTY writer", e))?;

        let (tx, output) = mpsc::channel(OUTPUT_QUEUE);
        spawn_reader(reader, tx);

        Ok(Self {
            master: pair.master,
            child,
            writer,
            output,
        })
    }

    /// Process id of the program, when the platform reports one
    pub fn process_id(&self) -> Option<u32> {
        self.child.process_id()
    }

    /// Pass input to the program
    pub fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.writer.write_all(data)?;
        self.writer.flush()
    }

    /// Apply a window size
    pub fn resize(&self, size: WindowSize) -> Result<(), RcmdError> {
        tracing::debug!(rows = size.rows, cols = size.cols, "Resizing PTY");
        self.master
            .resize(pty_size(size))
            .map_err(|e| pty_error("Failed to resize PTY", e))
    }

    /// Next chunk of program output; `None` once the program is gone
    pub async fn output(&mut self) -> Option<Vec<u8>> {
        self.output.recv().await
    }

    /// Stop the program if it is still running and collect its status
    pub fn close(mut self) -> Option<u32> {
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
        }
        match self.child.wait() {
            Ok(status) => Some(status.exit_code()),
            Err(e) => {
                tracing::warn!("Failed to wait for program: {}", e);
                None
            }
        }
    }
}

/// Read the PTY master on the blocking pool until the program goes away
fn spawn_reader(mut reader: Box<dyn Read + Send>, tx: mpsc::Sender<Vec<u8>>) {
    tokio::task::spawn_blocking(move || {
        let mut buf = [0u8; CHUNK_SIZE];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.blocking_send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                // EIO once the last slave descriptor is closed
                Err(e) => {
                    tracing::debug!("PTY reader stopped: {}", e);
                    break;
                }
            }
        }
        tracing::debug!("PTY reader exiting");
    });
}

/// Relay between the connection and the PTY until either side closes
pub async fn relay<S>(socket: S, session: &mut PtySession) -> Result<Ended, RcmdError>
where
    S: AsyncRead + AsyncWrite,
{
    let (from_client, mut to_client) = tokio::io::split(socket);
    let mut input = FramedRead::new(from_client, LoginStreamCodec::new());

    loop {
        tokio::select! {
            item = input.next() => match item {
                Some(Ok(LoginStreamItem::Data(data))) => session.write(&data)?,
                Some(Ok(LoginStreamItem::Resize(size))) => session.resize(size)?,
                Some(Err(e)) => return Err(e.into()),
                None => {
                    tracing::debug!("Connection closed by client");
                    return Ok(Ended::Client);
                }
            },

            chunk = session.output() => match chunk {
                Some(data) => {
                    to_client.write_all(&data).await?;
                    to_client.flush().await?;
                }
                None => {
                    tracing::debug!("Program output closed");
                    return Ok(Ended::Program);
                }
            },
        }
    }
}

/// Run an accepted login session to completion
///
/// Switches to the account, starts its shell on a 24x80 PTY with `TERM`
/// from the request, and relays until either side closes.
pub async fn serve(accepted: Accepted) -> Result<Ended, RcmdError> {
    let Accepted { context, account } = accepted;
    let SessionDetail::Login { terminal, .. } = &context.detail else {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "not a login session").into());
    };

    account.assume()?;
    let mut session = spawn_login_shell(&account, terminal)?;

    let ended = relay(context.primary, &mut session).await;
    let status = session.close();
    tracing::info!(user = %account.name, ?status, "Session ended");
    ended
}

/// Start the account's login shell on a 24x80 PTY
pub fn spawn_login_shell(account: &Account, terminal: &str) -> Result<PtySession, RcmdError> {
    let mut env = account.environment();
    env.push(("TERM".to_string(), terminal.to_string()));
    PtySession::spawn(
        account.shell(),
        LOGIN_SHELL_ARGS,
        &env,
        account.working_dir(),
        WindowSize::default_size(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;

    fn spawn_sh(script: &str) -> PtySession {
        let env = vec![("PATH".to_string(), "/usr/bin:/bin".to_string())];
        PtySession::spawn(
            Path::new("/bin/sh"),
            &["-c", script],
            &env,
            Path::new("/"),
            WindowSize::default_size(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_resize_record_reaches_pty() {
        let mut session = spawn_sh("read line; stty size");
        let (socket, mut client) = tokio::io::duplex(4096);

        let mut input = WindowSize::new(40, 100).to_bytes().to_vec();
        input.extend_from_slice(b"go\n");
        client.write_all(&input).await.unwrap();

        let ended = tokio::time::timeout(Duration::from_secs(10), relay(socket, &mut session))
            .await
            .expect("program should exit")
            .unwrap();
        assert_eq!(ended, Ended::Program);
        session.close();

        let mut output = Vec::new();
        client.read_to_end(&mut output).await.unwrap();
        let output = String::from_utf8_lossy(&output);
        assert!(output.contains("40 100"), "unexpected output: {output:?}");
    }

    #[tokio::test]
    async fn test_client_close_ends_session() {
        let mut session = spawn_sh("sleep 30");
        let (socket, client) = tokio::io::duplex(4096);
        drop(client);

        let ended = tokio::time::timeout(Duration::from_secs(10), relay(socket, &mut session))
            .await
            .expect("relay should notice the closed connection")
            .unwrap();
        assert_eq!(ended, Ended::Client);
        assert!(session.close().is_some());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_account_shell_runs_as_login_shell() {
        let home = tempfile::tempdir().unwrap();
        let account = Account {
            name: "alice".into(),
            uid: 1000,
            gid: 1000,
            home: home.path().to_path_buf(),
            shell: "/bin/sh".into(),
        };
        let session = spawn_login_shell(&account, "xterm").unwrap();
        let pid = session.process_id().expect("child pid");

        let mut argv = String::new();
        for _ in 0..100 {
            let raw = std::fs::read(format!("/proc/{pid}/cmdline")).unwrap_or_default();
            argv = String::from_utf8_lossy(&raw).replace('\0', " ");
            if argv.starts_with("/bin/sh") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        session.close();

        assert_eq!(argv.trim_end(), "/bin/sh -l");
    }
}
