//! rcmd-core: Connection setup and shared abstractions for rcmd
//!
//! This crate provides the pieces shared by the `rlogin`/`rsh` clients and
//! the `rlogind`/`rshd` servers: the error taxonomy, configuration, address
//! resolution, privileged-port allocation, connection establishment, and the
//! traits through which the protocol engine talks to its collaborators.

pub mod config;
pub mod connect;
pub mod endpoint;
pub mod error;
pub mod port;
pub mod traits;
pub mod types;

pub use connect::{ConnectEvent, Connector, PrimaryConnection, StderrListener};
pub use endpoint::{resolve, Endpoint};
pub use config::{ClientConfig, ServerConfig};
pub use error::{ConfigError, RcmdError};
pub use port::{BindTarget, PortAllocator, PortRange};
pub use types::{SessionContext, SessionDetail};
pub use traits::{AuthRequest, Authenticator, RawModeGuard, TerminalControl};
