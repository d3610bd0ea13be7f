//! Local terminal control
//!
//! Size and speed come straight from the terminal driver; raw mode is
//! handled by crossterm.

use std::io;
use std::os::unix::io::RawFd;

use rcmd_core::{RawModeGuard, TerminalControl};
use rcmd_protocol::WindowSize;

/// Input baud rates the terminal driver can report
const BAUD_RATES: &[(libc::speed_t, u32)] = &[
    (libc::B50, 50),
    (libc::B75, 75),
    (libc::B110, 110),
    (libc::B134, 134),
    (libc::B150, 150),
    (libc::B200, 200),
    (libc::B300, 300),
    (libc::B600, 600),
    (libc::B1200, 1200),
    (libc::B1800, 1800),
    (libc::B2400, 2400),
    (libc::B4800, 4800),
    (libc::B9600, 9600),
    (libc::B19200, 19200),
    (libc::B38400, 38400),
    (libc::B57600, 57600),
    (libc::B115200, 115200),
    (libc::B230400, 230400),
];

#[cfg(any(target_os = "linux", target_os = "android"))]
const HIGH_BAUD_RATES: &[(libc::speed_t, u32)] = &[
    (libc::B460800, 460800),
    (libc::B500000, 500000),
    (libc::B576000, 576000),
    (libc::B921600, 921600),
    (libc::B1000000, 1000000),
    (libc::B1152000, 1152000),
    (libc::B1500000, 1500000),
    (libc::B2000000, 2000000),
    (libc::B2500000, 2500000),
    (libc::B3000000, 3000000),
    (libc::B3500000, 3500000),
    (libc::B4000000, 4000000),
];

#[cfg(not(any(target_os = "linux", target_os = "android")))]
const HIGH_BAUD_RATES: &[(libc::speed_t, u32)] = &[];

/// Decimal baud rate for a driver speed code
pub fn baud_rate(speed: libc::speed_t) -> Option<u32> {
    BAUD_RATES
        .iter()
        .chain(HIGH_BAUD_RATES)
        .find(|(code, _)| *code == speed)
        .map(|(_, rate)| *rate)
}

/// The terminal on standard input
#[derive(Debug, Clone, Copy)]
pub struct LocalTerminal {
    fd: RawFd,
}

impl LocalTerminal {
    /// Terminal attached to standard input
    pub fn stdin() -> Self {
        Self {
            fd: libc::STDIN_FILENO,
        }
    }

    /// Whether the descriptor is a terminal at all
    pub fn is_tty(&self) -> bool {
        unsafe { libc::isatty(self.fd) == 1 }
    }
}

impl TerminalControl for LocalTerminal {
    fn window_size(&self) -> io::Result<WindowSize> {
        let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
        if unsafe { libc::ioctl(self.fd, libc::TIOCGWINSZ, &mut ws) } == 0 {
            return Ok(WindowSize::new(ws.ws_row, ws.ws_col).with_pixels(ws.ws_xpixel, ws.ws_ypixel));
        }

        let (cols, rows) = crossterm::terminal::size()?;
        Ok(WindowSize::new(rows, cols))
    }

    fn speed(&self) -> Option<String> {
        let mut tios: libc::termios = unsafe { std::mem::zeroed() };
        if unsafe { libc::tcgetattr(self.fd, &mut tios) } != 0 {
            return None;
        }
        let speed = unsafe { libc::cfgetispeed(&tios) };
        baud_rate(speed).map(|rate| rate.to_string())
    }

    fn enter_raw_mode(&self) -> io::Result<RawModeGuard> {
        if !self.is_tty() {
            return Ok(RawModeGuard::noop());
        }

        crossterm::terminal::enable_raw_mode()?;
        tracing::debug!("Terminal switched to raw mode");
        Ok(RawModeGuard::new(|| {
            if let Err(e) = crossterm::terminal::disable_raw_mode() {
                tracing::warn!("Failed to restore terminal mode: {}", e);
            }
        }))
    }
}
