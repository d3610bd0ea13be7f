//! Client session runners
//!
//! Connection setup, handshake and forwarding for one `rlogin` or `rsh`
//! invocation.

use std::io;

use nix::unistd::{geteuid, getuid, setuid};

use rcmd_core::{
    resolve, ClientConfig, Connector, RcmdError, SessionContext, SessionDetail, TerminalControl,
};
use rcmd_protocol::{LoginRequest, ShellRequest, FALLBACK_SPEED};

use crate::handshake;
use crate::local::LocalStream;
use crate::mux::{self, Closed};
use crate::output;
use crate::signal::SignalBridge;
use crate::terminal::LocalTerminal;

/// Who connects where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Host name or address
    pub host: String,
    /// Service name or port number
    pub service: String,
    /// Local account name
    pub client_user: String,
    /// Remote account name
    pub server_user: String,
}

impl Target {
    /// Build a target, defaulting the remote user to the local one
    pub fn new(
        host: impl Into<String>,
        service: impl Into<String>,
        client_user: impl Into<String>,
        server_user: Option<String>,
    ) -> Self {
        let client_user = client_user.into();
        Self {
            host: host.into(),
            service: service.into(),
            server_user: server_user.unwrap_or_else(|| client_user.clone()),
            client_user,
        }
    }
}

/// Terminal type and speed announced in the login handshake
///
/// `$TERM` falls back to the configured default, an unknown speed to 9600.
pub fn terminal_identity(
    config: &ClientConfig,
    term: Option<String>,
    terminal: &impl TerminalControl,
) -> (String, String) {
    let term = term
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| config.default_terminal.clone());
    let speed = terminal
        .speed()
        .unwrap_or_else(|| FALLBACK_SPEED.to_string());
    (term, speed)
}

fn connector(config: &ClientConfig) -> Connector {
    let connector = Connector::new(config.ports);
    if config.report_progress {
        connector.with_progress(output::print_progress)
    } else {
        connector
    }
}

/// Give up a set-user-id root identity once the reserved ports are bound
pub fn drop_privileges() -> io::Result<()> {
    let real = getuid();
    if geteuid() == real {
        return Ok(());
    }
    setuid(real)?;
    tracing::debug!(uid = real.as_raw(), "Dropped privileges");
    Ok(())
}

/// Run an interactive login session on the local terminal
pub async fn login(config: &ClientConfig, target: &Target) -> Result<Closed, RcmdError> {
    let primary = connector(config)
        .connect_login(&target.host, &target.service)
        .await?;
    drop_privileges()?;

    let terminal = LocalTerminal::stdin();
    let (term, speed) = terminal_identity(config, std::env::var("TERM").ok(), &terminal);
    let request = LoginRequest::new(&target.client_user, &target.server_user, term, speed);

    let mut stream = primary.stream;
    handshake::login(&mut stream, &request).await?;

    let context = SessionContext {
        client_user: request.client_user,
        server_user: request.server_user,
        detail: SessionDetail::Login {
            terminal: request.terminal,
            speed: request.speed,
        },
        peer_host: primary.endpoint.host,
        primary: stream,
        auxiliary: None,
    };
    tracing::info!(%context, "Session accepted");

    let mut resize = SignalBridge::resize()?;
    mux::login(
        context.primary,
        LocalStream::stdin()?,
        LocalStream::stdout()?,
        &terminal,
        &mut resize,
    )
    .await
}

/// Run a remote command with local stdio attached
///
/// With `read_input` unset standard input is never read.
pub async fn shell(
    config: &ClientConfig,
    target: &Target,
    command: &[String],
    read_input: bool,
) -> Result<Closed, RcmdError> {
    let connector = connector(config);
    let (primary, listener) = if config.stderr_channel {
        let (primary, listener) = connector.connect_shell(&target.host, &target.service).await?;
        (primary, Some(listener))
    } else {
        let endpoints = resolve(&target.host, &target.service)?;
        (connector.connect_any(&target.host, &endpoints).await?, None)
    };
    drop_privileges()?;

    let request = ShellRequest::from_words(
        listener.as_ref().map(|l| l.port()),
        &target.client_user,
        &target.server_user,
        command,
    );

    let mut stream = primary.stream;
    handshake::shell(&mut stream, &request).await?;

    let auxiliary = match listener {
        Some(listener) => Some(listener.accept(config.ports).await?),
        None => None,
    };

    let context = SessionContext {
        client_user: request.client_user,
        server_user: request.server_user,
        detail: SessionDetail::Shell {
            command: request.command,
        },
        peer_host: primary.endpoint.host,
        primary: stream,
        auxiliary,
    };
    tracing::info!(%context, "Session accepted");

    let input = if read_input {
        Some(LocalStream::stdin()?)
    } else {
        None
    };
    mux::shell(
        context.primary,
        context.auxiliary,
        input,
        LocalStream::stdout()?,
        LocalStream::stderr()?,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcmd_core::RawModeGuard;
    use rcmd_protocol::WindowSize;

    struct NoSpeed;

    impl TerminalControl for NoSpeed {
        fn window_size(&self) -> io::Result<WindowSize> {
            Ok(WindowSize::default())
        }

        fn speed(&self) -> Option<String> {
            None
        }

        fn enter_raw_mode(&self) -> io::Result<RawModeGuard> {
            Ok(RawModeGuard::noop())
        }
    }

    #[test]
    fn test_drop_privileges_without_setuid_is_noop() {
        let before = getuid();
        assert_eq!(geteuid(), before);

        drop_privileges().unwrap();
        assert_eq!(getuid(), before);
        assert_eq!(geteuid(), before);
    }

    #[test]
    fn test_remote_user_defaults_to_local() {
        let target = Target::new("host", "login", "alice", None);
        assert_eq!(target.server_user, "alice");

        let target = Target::new("host", "login", "alice", Some("bob".into()));
        assert_eq!(target.server_user, "bob");
        assert_eq!(target.client_user, "alice");
    }

    #[test]
    fn test_terminal_identity_fallbacks() {
        let config = ClientConfig::default();

        let (term, speed) = terminal_identity(&config, None, &NoSpeed);
        assert_eq!(term, "network");
        assert_eq!(speed, "9600");

        let (term, _) = terminal_identity(&config, Some("xterm".into()), &NoSpeed);
        assert_eq!(term, "xterm");

        let (term, _) = terminal_identity(&config, Some(String::new()), &NoSpeed);
        assert_eq!(term, "network");
    }
}
