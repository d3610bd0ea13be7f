//! Client configuration

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::port::PortRange;

/// Configuration shared by `rlogin` and `rsh`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Service name or port for remote login
    pub login_service: String,

    /// Service name or port for remote shell
    pub shell_service: String,

    /// Source ports to originate connections from
    pub ports: PortRange,

    /// Terminal type sent when `TERM` is unset
    pub default_terminal: String,

    /// Whether `rsh` asks for a separate error stream
    pub stderr_channel: bool,

    /// Print "Trying ..." progress while connecting
    pub report_progress: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            login_service: "login".to_string(),
            shell_service: "shell".to_string(),
            ports: PortRange::privileged(),
            default_terminal: "network".to_string(),
            stderr_channel: true,
            report_progress: true,
        }
    }
}

impl ClientConfig {
    /// Check values that serde cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ports.validate()?;
        if self.login_service.is_empty() || self.shell_service.is_empty() {
            return Err(ConfigError::Invalid("service names must not be empty".into()));
        }
        Ok(())
    }
}
