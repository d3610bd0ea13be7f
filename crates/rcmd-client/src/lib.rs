//! rcmd-client: `rlogin` and `rsh` clients
//!
//! The library holds everything the two binaries share: the client side of
//! the handshake, the forwarding loops, the resize signal bridge and the
//! local terminal and stdio adapters.

pub mod handshake;
pub mod local;
pub mod mux;
pub mod output;
pub mod session;
pub mod signal;
pub mod terminal;

pub use local::LocalStream;
pub use mux::Closed;
pub use session::Target;
pub use signal::{Notifier, SignalBridge};
pub use terminal::LocalTerminal;

use std::path::Path;

use rcmd_core::config::{self, ClientConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the stderr log subscriber; `RUST_LOG` overrides `level`
pub fn init_logging(level: &str) {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| level.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Load the client configuration
///
/// A broken file is reported and replaced by the defaults.
pub fn load_client_config(path: &Path) -> ClientConfig {
    let config = config::load_or_default::<ClientConfig>(path)
        .and_then(|config| config.validate().map(|()| config));
    match config {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Ignoring config {:?}: {}", path, e);
            ClientConfig::default()
        }
    }
}
