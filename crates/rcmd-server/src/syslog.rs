//! Log output to the system logger
//!
//! Under inetd the standard streams are the client's socket, so the servers
//! send their diagnostics to syslog. Each formatted event becomes one
//! message, with its priority taken from the event level.

use std::ffi::{CStr, CString};
use std::io::{self, Write};
use std::os::raw::{c_char, c_int};

use tracing::{Level, Metadata};
use tracing_subscriber::fmt::MakeWriter;

const FORMAT: &[u8] = b"%s\0";

/// Open the system log under `ident`, tagged with the pid, in the
/// authorization facility
pub fn open(ident: &str) {
    let ident = CString::new(ident.replace('\0', "")).unwrap_or_default();
    // openlog keeps the pointer for the rest of the process
    let ident: &'static CStr = Box::leak(ident.into_boxed_c_str());
    unsafe { libc::openlog(ident.as_ptr(), libc::LOG_PID, libc::LOG_AUTHPRIV) };
}

/// Syslog priority for a tracing level
pub fn priority(level: &Level) -> c_int {
    match *level {
        Level::ERROR => libc::LOG_ERR,
        Level::WARN => libc::LOG_WARNING,
        Level::INFO => libc::LOG_INFO,
        Level::DEBUG | Level::TRACE => libc::LOG_DEBUG,
    }
}

/// Creates one [`SyslogWriter`] per event
#[derive(Debug, Clone, Copy, Default)]
pub struct SyslogMakeWriter;

impl<'a> MakeWriter<'a> for SyslogMakeWriter {
    type Writer = SyslogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SyslogWriter::new(libc::LOG_INFO)
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        SyslogWriter::new(priority(meta.level()))
    }
}

/// Collects one formatted event and submits it when dropped
#[derive(Debug)]
pub struct SyslogWriter {
    priority: c_int,
    buf: Vec<u8>,
}

impl SyslogWriter {
    fn new(priority: c_int) -> Self {
        Self {
            priority,
            buf: Vec::new(),
        }
    }

    /// The message as it will be submitted
    fn message(&self) -> Option<CString> {
        let mut text: Vec<u8> = self.buf.iter().copied().filter(|&b| b != 0).collect();
        while text.last().is_some_and(|b| b.is_ascii_whitespace()) {
            text.pop();
        }
        if text.is_empty() {
            return None;
        }
        CString::new(text).ok()
    }
}

impl Write for SyslogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for SyslogWriter {
    fn drop(&mut self) {
        if let Some(message) = self.message() {
            unsafe {
                libc::syslog(
                    self.priority,
                    FORMAT.as_ptr() as *const c_char,
                    message.as_ptr(),
                )
            };
        }
    }
}
