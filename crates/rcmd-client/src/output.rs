//! Diagnostics for the client binaries
//!
//! Everything goes to stderr; stdout belongs to the session. Colors are only
//! used when stderr is a terminal.

use std::io::Write;

use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use crossterm::tty::IsTty;

use rcmd_core::ConnectEvent;

fn print_prefixed(color: Color, prefix: &str, msg: &str) {
    let mut stderr = std::io::stderr();
    if stderr.is_tty() {
        let _ = crossterm::execute!(
            stderr,
            SetForegroundColor(color),
            Print(prefix),
            ResetColor,
            Print(msg),
            Print("\r\n")
        );
    } else {
        let _ = writeln!(stderr, "{}{}", prefix, msg);
    }
}

/// Print a fatal error as `<prog>: <message>`
pub fn print_error(prog: &str, msg: &str) {
    print_prefixed(Color::Red, &format!("{}: ", prog), msg);
}

/// Render a connection progress event
///
/// Produces lines of the form `Trying 10.0.0.1 port 513... Connected.`
pub fn format_progress(event: &ConnectEvent) -> String {
    match event {
        ConnectEvent::Trying(endpoint) => format!("Trying {}...", endpoint),
        ConnectEvent::Connected => " Connected.\n".to_string(),
        ConnectEvent::Failed(reason) => format!(" {}\n", reason),
    }
}

/// Print a connection progress event to stderr
pub fn print_progress(event: &ConnectEvent) {
    let mut stderr = std::io::stderr();
    let _ = stderr.write_all(format_progress(event).as_bytes());
    let _ = stderr.flush();
}
