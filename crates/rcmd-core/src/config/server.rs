//! Server configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::port::PortRange;

/// Configuration shared by `rlogind` and `rshd`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Ports a client must connect from, and the range for connect-back
    pub ports: PortRange,

    /// Authentication policy
    pub auth: AuthConfig,
}

impl ServerConfig {
    /// Check values that serde cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ports.validate()?;
        if self.auth.method == AuthMethod::Rules && self.auth.rules.is_empty() {
            tracing::warn!("Rule-based authentication configured without rules; every request will be refused");
        }
        Ok(())
    }
}

/// Which authenticator decides whether a request is trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    /// `hosts.equiv` and the account's `.rhosts`
    #[default]
    Rhosts,
    /// Explicit rules from this file
    Rules,
}

/// Authentication settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Authenticator to use
    pub method: AuthMethod,

    /// System-wide trusted hosts file
    pub hosts_equiv: PathBuf,

    /// Rules for `AuthMethod::Rules`, first match wins
    pub rules: Vec<AuthRule>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            method: AuthMethod::Rhosts,
            hosts_equiv: PathBuf::from("/etc/hosts.equiv"),
            rules: Vec::new(),
        }
    }
}

/// One trust rule; `*` matches anything
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRule {
    /// Client host name or numeric address
    pub host: String,
    /// Account name on the client host
    pub client_user: String,
    /// Account name on this host
    pub server_user: String,
}

impl AuthRule {
    /// Whether the rule covers this request
    pub fn matches(&self, host: &str, address: &str, client_user: &str, server_user: &str) -> bool {
        let host_ok = self.host == "*"
            || self.host.eq_ignore_ascii_case(host)
            || self.host == address;
        host_ok
            && (self.client_user == "*" || self.client_user == client_user)
            && (self.server_user == "*" || self.server_user == server_user)
    }
}
