//! Core error types for rcmd

use rcmd_protocol::ProtocolError;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type shared by the clients and servers
///
/// Every variant is fatal to the current process. The only retries are the
/// bounded scans over candidate ports and addresses during connection setup.
#[derive(Error, Debug)]
pub enum RcmdError {
    /// Host or service name lookup failed
    #[error("Error looking up {target}: {message}")]
    ResolutionFailure { target: String, message: String },

    /// Every port in the privileged range was unavailable
    #[error("Could not bind to a privileged port ({attempts} ports tried)")]
    PortExhausted { attempts: usize },

    /// A candidate local address could not be used for binding
    #[error("Error setting up local address on port {port}: {source}")]
    LookupFailed {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// The peer connected from a port outside the privileged range
    #[error("Connection from {peer} on illegal port {port}")]
    UnprivilegedSource { peer: String, port: u16 },

    /// No candidate address accepted the connection
    #[error("Could not make a connection to {target}")]
    ConnectFailure { target: String },

    /// Malformed or truncated handshake
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The server answered the handshake with a non-zero status, or not at all
    #[error("Server refused the session: {}", rejection_detail(*code, reason.as_deref()))]
    HandshakeRejected {
        code: Option<u8>,
        reason: Option<String>,
    },

    /// The authentication collaborator refused the request
    #[error("Authentication failure for {user}: {reason}")]
    AuthenticationFailure { user: String, reason: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Read or write failure while setting up or forwarding
    #[error("I/O error: {0}")]
    IoFailure(#[from] std::io::Error),
}

impl RcmdError {
    /// Shorthand for an authentication failure
    pub fn auth(user: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AuthenticationFailure {
            user: user.into(),
            reason: reason.into(),
        }
    }

    /// Short diagnostic suitable for the line sent after a rejection byte
    ///
    /// Internal details stay in the log; the peer only learns the category.
    pub fn peer_diagnostic(&self) -> &'static str {
        match self {
            Self::AuthenticationFailure { .. } => "Authentication failure",
            Self::UnprivilegedSource { .. } => "Permission denied",
            Self::Protocol(_) => "Protocol error",
            _ => "Server error",
        }
    }
}

fn rejection_detail(code: Option<u8>, reason: Option<&str>) -> String {
    match (code, reason) {
        (Some(code), Some(reason)) => format!("{} (status {})", reason, code),
        (Some(code), None) => format!("status {}", code),
        (None, _) => "no acknowledgement received".to_string(),
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_message() {
        let err = RcmdError::HandshakeRejected {
            code: Some(1),
            reason: Some("Authentication failure".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Server refused the session: Authentication failure (status 1)"
        );

        let err = RcmdError::HandshakeRejected {
            code: Some(3),
            reason: None,
        };
        assert!(err.to_string().ends_with("status 3"));

        let err = RcmdError::HandshakeRejected {
            code: None,
            reason: None,
        };
        assert!(err.to_string().ends_with("no acknowledgement received"));
    }

    #[test]
    fn test_peer_diagnostic_hides_details() {
        let err = RcmdError::auth("alice", "no matching rule for host evil.example");
        assert_eq!(err.peer_diagnostic(), "Authentication failure");
        assert!(err.to_string().contains("evil.example"));
    }
}
