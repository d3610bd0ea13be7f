//! rcmd-server: `rshd` and `rlogind`
//!
//! Both servers are started by inetd with the client connection on their
//! standard streams. They verify the peer, run the server side of the
//! handshake, authenticate the request, and then either execute the command
//! (`rshd`) or run a login shell on a pseudo-terminal (`rlogind`).

pub mod acceptor;
pub mod account;
pub mod auth;
pub mod launch;
pub mod login;
pub mod peer;
pub mod syslog;

pub use acceptor::{Accepted, Acceptor};
pub use account::{Account, AccountDirectory, SystemAccounts};
pub use login::{Ended, PtySession};
pub use peer::Peer;

use std::io;
use std::os::unix::io::FromRawFd;
use std::path::Path;

use tokio::net::TcpStream;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rcmd_core::config::{self, ServerConfig};
use rcmd_core::ConfigError;

/// Send logs to syslog as `ident`; `RUST_LOG` overrides `level`
pub fn init_logging(ident: &str, level: &str) {
    syslog::open(ident);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(syslog::SyslogMakeWriter)
                .with_ansi(false)
                .without_time(),
        )
        .init();
}

/// Load and validate the server configuration
///
/// A missing file gives the defaults; a broken one is an error.
pub fn load_server_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let config = config::load_or_default::<ServerConfig>(path)?;
    config.validate()?;
    Ok(config)
}

/// The connection inetd passed on standard input
pub fn inherited_connection() -> io::Result<TcpStream> {
    // fd 0 belongs to this process for its whole lifetime
    let stream = unsafe { std::net::TcpStream::from_raw_fd(libc::STDIN_FILENO) };
    stream.set_nonblocking(true)?;
    TcpStream::from_std(stream)
}
