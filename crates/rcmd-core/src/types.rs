//! Core domain types

use std::fmt;

use tokio::net::TcpStream;

/// What the peer asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionDetail {
    /// Interactive login
    Login {
        /// Terminal type
        terminal: String,
        /// Terminal speed, decimal
        speed: String,
    },
    /// Single command
    Shell {
        /// Command line as sent
        command: String,
    },
}

impl fmt::Display for SessionDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Login { terminal, speed } => write!(f, "login ({}/{})", terminal, speed),
            Self::Shell { command } => write!(f, "shell `{}`", command),
        }
    }
}

/// An accepted session
///
/// Owns the connection sockets; dropping the context closes them.
#[derive(Debug)]
pub struct SessionContext {
    /// Account on the client host
    pub client_user: String,
    /// Account on the server host
    pub server_user: String,
    /// Login or shell parameters
    pub detail: SessionDetail,
    /// Name of the other end
    pub peer_host: String,
    /// Connection the handshake ran on
    pub primary: TcpStream,
    /// Error-stream connection of a shell session, if one was set up
    pub auxiliary: Option<TcpStream>,
}

impl SessionContext {
    /// Whether this is a login session
    pub fn is_login(&self) -> bool {
        matches!(self.detail, SessionDetail::Login { .. })
    }
}

impl fmt::Display for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{} as {}: {}",
            self.client_user, self.peer_host, self.server_user, self.detail
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_display() {
        let login = SessionDetail::Login {
            terminal: "xterm".into(),
            speed: "38400".into(),
        };
        assert_eq!(login.to_string(), "login (xterm/38400)");

        let shell = SessionDetail::Shell {
            command: "ls -la".into(),
        };
        assert_eq!(shell.to_string(), "shell `ls -la`");
    }
}
