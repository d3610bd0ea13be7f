//! Core trait definitions

mod auth;
mod terminal;

pub use auth::{AuthRequest, Authenticator};
pub use terminal::{RawModeGuard, TerminalControl};
