//! Terminal-control collaborator

use std::fmt;
use std::io;

use rcmd_protocol::WindowSize;

/// The local terminal as seen by the login client
///
/// The protocol engine only queries size and speed; mode changes are
/// scoped by the returned guard.
pub trait TerminalControl {
    /// Current window dimensions
    fn window_size(&self) -> io::Result<WindowSize>;

    /// Input baud rate as a decimal string, if representable
    fn speed(&self) -> Option<String>;

    /// Switch the terminal to raw mode until the guard is dropped
    fn enter_raw_mode(&self) -> io::Result<RawModeGuard>;
}

/// Restores the terminal mode on drop
pub struct RawModeGuard {
    restore: Option<Box<dyn FnOnce() + Send>>,
}

impl RawModeGuard {
    /// Run `restore` when the guard goes away
    pub fn new(restore: impl FnOnce() + Send + 'static) -> Self {
        Self {
            restore: Some(Box::new(restore)),
        }
    }

    /// A guard with nothing to restore
    pub fn noop() -> Self {
        Self { restore: None }
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Some(restore) = self.restore.take() {
            restore();
        }
    }
}

impl fmt::Debug for RawModeGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawModeGuard")
            .field("armed", &self.restore.is_some())
            .finish()
    }
}
