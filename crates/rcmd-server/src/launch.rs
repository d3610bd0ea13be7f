//! Replacing `rshd` with the requested command
//!
//! The command runs as `<shell> -c <command>` under the account's
//! credentials, with the connection on standard input and output and the
//! error stream (or the connection again, if none was requested) on
//! standard error.

use std::io;
use std::os::fd::OwnedFd;
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};

use tokio::net::TcpStream;

use rcmd_core::{RcmdError, SessionDetail};

use crate::acceptor::Accepted;
use crate::account::Account;

/// Build the command line for a shell request
pub fn shell_command(account: &Account, command: &str) -> Command {
    let shell = account.shell();
    let arg0 = shell
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| shell.as_os_str().to_os_string());

    let mut cmd = Command::new(shell);
    cmd.arg0(arg0)
        .arg("-c")
        .arg(command)
        .env_clear()
        .envs(account.environment())
        .current_dir(account.working_dir());
    cmd
}

/// Turn a socket into a blocking descriptor for a child's stdio
fn blocking(stream: TcpStream) -> io::Result<std::net::TcpStream> {
    let stream = stream.into_std()?;
    stream.set_nonblocking(false)?;
    Ok(stream)
}

/// Switch to the account and execute the command
///
/// Only returns if something went wrong; on success the process image is
/// replaced.
pub fn exec_shell(accepted: Accepted) -> RcmdError {
    match prepare(accepted) {
        Ok(mut cmd) => {
            let err = cmd.exec();
            tracing::error!(program = ?cmd.get_program(), "Failed to execute shell: {}", err);
            RcmdError::IoFailure(err)
        }
        Err(e) => e,
    }
}

fn prepare(accepted: Accepted) -> Result<Command, RcmdError> {
    let Accepted { context, account } = accepted;
    let SessionDetail::Shell { command } = &context.detail else {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "not a shell session").into());
    };

    let mut cmd = shell_command(&account, command);
    let primary = blocking(context.primary)?;
    let errors = match context.auxiliary {
        Some(aux) => blocking(aux)?,
        None => primary.try_clone()?,
    };
    cmd.stdin(Stdio::from(OwnedFd::from(primary.try_clone()?)))
        .stdout(Stdio::from(OwnedFd::from(primary)))
        .stderr(Stdio::from(OwnedFd::from(errors)));

    account.assume()?;
    tracing::info!(
        user = %account.name,
        shell = %account.shell().display(),
        dir = %account.working_dir().display(),
        "Executing command"
    );
    Ok(cmd)
}
