//! Configuration management for rcmd

mod client;
mod server;

pub use client::ClientConfig;
pub use server::{AuthConfig, AuthMethod, AuthRule, ServerConfig};

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Environment variable overriding the server configuration path
pub const SERVER_CONFIG_ENV: &str = "RCMD_SERVER_CONFIG";

/// System-wide server configuration file
pub const DEFAULT_SERVER_CONFIG: &str = "/etc/rcmd/server.toml";

/// Get the per-user configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rcmd")
}

/// Get the client configuration file path
pub fn client_config_path() -> PathBuf {
    default_config_dir().join("client.toml")
}

/// Get the server configuration file path
pub fn server_config_path() -> PathBuf {
    std::env::var_os(SERVER_CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SERVER_CONFIG))
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Load configuration, using defaults when the file does not exist
///
/// A file that exists but cannot be read or parsed is still an error.
pub fn load_or_default<T>(path: &Path) -> Result<T, ConfigError>
where
    T: serde::de::DeserializeOwned + Default,
{
    match load_config(path) {
        Ok(config) => Ok(config),
        Err(ConfigError::NotFound(_)) => Ok(T::default()),
        Err(e) => Err(e),
    }
}
