//! Privileged port allocation
//!
//! Both clients originate their connections from a reserved port, and the
//! shell server connects back from one. The peer takes the source port as a
//! (weak) sign that the other end runs with privileges.
//!
//! Ports are tried strictly downwards from the top of the range. There is no
//! port-reuse trickery; a busy port is simply skipped.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, RcmdError};

/// Highest reserved port handed out by default
pub const PRIVILEGED_PORT_HIGH: u16 = 1023;

/// Lowest reserved port handed out by default
pub const PRIVILEGED_PORT_LOW: u16 = 512;

/// Inclusive port range, scanned from `high` down to `low`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    /// First port tried
    pub high: u16,
    /// Last port tried
    pub low: u16,
}

impl PortRange {
    /// Create a range, rejecting an inverted one
    pub fn new(high: u16, low: u16) -> Result<Self, ConfigError> {
        let range = Self { high, low };
        range.validate()?;
        Ok(range)
    }

    /// The reserved range 1023..=512
    pub const fn privileged() -> Self {
        Self {
            high: PRIVILEGED_PORT_HIGH,
            low: PRIVILEGED_PORT_LOW,
        }
    }

    /// Check that the range is not inverted and does not include port 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.low == 0 || self.high < self.low {
            return Err(ConfigError::Invalid(format!(
                "port range {}..={} must satisfy 0 < low <= high",
                self.low, self.high
            )));
        }
        Ok(())
    }

    /// Whether a port falls inside the range
    pub fn contains(&self, port: u16) -> bool {
        (self.low..=self.high).contains(&port)
    }

    /// Number of ports in the range
    pub fn len(&self) -> usize {
        usize::from(self.high.saturating_sub(self.low)) + 1
    }

    /// Always false for a validated range
    pub fn is_empty(&self) -> bool {
        self.high < self.low
    }

    /// Ports in scan order
    pub fn descending(&self) -> impl Iterator<Item = u16> {
        (self.low..=self.high).rev()
    }

    /// The rest of the range below `port`, continuing a previous scan
    pub fn below(&self, port: u16) -> Option<Self> {
        let high = port.checked_sub(1)?.min(self.high);
        (high >= self.low).then_some(Self {
            high,
            low: self.low,
        })
    }
}

impl Default for PortRange {
    fn default() -> Self {
        Self::privileged()
    }
}

/// Something a local address can be bound to
pub trait BindTarget {
    /// Attempt to bind to `addr`; on failure the target must stay unbound
    fn try_bind(&self, addr: SocketAddr) -> io::Result<()>;
}

impl BindTarget for tokio::net::TcpSocket {
    fn try_bind(&self, addr: SocketAddr) -> io::Result<()> {
        self.bind(addr)
    }
}

/// Hands out the highest free port of a range
#[derive(Debug, Clone, Copy)]
pub struct PortAllocator {
    range: PortRange,
}

impl PortAllocator {
    /// Create an allocator over the given range
    pub fn new(range: PortRange) -> Self {
        Self { range }
    }

    /// The range this allocator scans
    pub fn range(&self) -> PortRange {
        self.range
    }

    /// Bind `target` to the first free port, scanning downwards
    ///
    /// A port that is in use or not permitted is skipped. Any other bind
    /// failure aborts the scan with `LookupFailed`. If every port is
    /// skipped the result is `PortExhausted`.
    pub fn acquire<B: BindTarget>(&self, target: &B, local: IpAddr) -> Result<u16, RcmdError> {
        let mut attempts = 0;

        for port in self.range.descending() {
            attempts += 1;
            match target.try_bind(SocketAddr::new(local, port)) {
                Ok(()) => {
                    tracing::debug!(port, attempts, "Bound to reserved port");
                    return Ok(port);
                }
                Err(e) if is_port_busy(&e) => {
                    tracing::trace!(port, error = %e, "Port unavailable");
                }
                Err(e) => return Err(RcmdError::LookupFailed { port, source: e }),
            }
        }

        Err(RcmdError::PortExhausted { attempts })
    }
}

/// Wildcard local address of the same family as `peer`
pub fn unspecified_for(peer: &SocketAddr) -> IpAddr {
    match peer {
        SocketAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        SocketAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    }
}

fn is_port_busy(err: &io::Error) -> bool {
    if matches!(
        err.kind(),
        io::ErrorKind::AddrInUse | io::ErrorKind::PermissionDenied
    ) {
        return true;
    }
    #[cfg(unix)]
    if let Some(code) = err.raw_os_error() {
        return code == libc::EADDRINUSE || code == libc::EACCES;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashSet;

    /// Records every bind attempt and refuses the configured ports
    struct FakeSocket {
        busy: HashSet<u16>,
        failure: io::ErrorKind,
        attempts: RefCell<Vec<u16>>,
    }

    impl FakeSocket {
        fn new(busy: impl IntoIterator<Item = u16>) -> Self {
            Self {
                busy: busy.into_iter().collect(),
                failure: io::ErrorKind::AddrInUse,
                attempts: RefCell::new(Vec::new()),
            }
        }
    }

    impl BindTarget for FakeSocket {
        fn try_bind(&self, addr: SocketAddr) -> io::Result<()> {
            self.attempts.borrow_mut().push(addr.port());
            if self.busy.contains(&addr.port()) {
                Err(io::Error::from(self.failure))
            } else {
                Ok(())
            }
        }
    }

    fn any_v4() -> IpAddr {
        IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    }

    #[test]
    fn test_first_free_port_is_highest() {
        let socket = FakeSocket::new([]);
        let port = PortAllocator::new(PortRange::privileged())
            .acquire(&socket, any_v4())
            .unwrap();

        assert_eq!(port, 1023);
        assert_eq!(*socket.attempts.borrow(), vec![1023]);
    }

    #[test]
    fn test_busy_ports_are_skipped_in_descending_order() {
        let socket = FakeSocket::new([1023, 1022, 1020]);
        let port = PortAllocator::new(PortRange::privileged())
            .acquire(&socket, any_v4())
            .unwrap();

        assert_eq!(port, 1021);
        assert_eq!(*socket.attempts.borrow(), vec![1023, 1022, 1021]);
    }

    #[test]
    fn test_exhaustion_after_whole_range() {
        let mut socket = FakeSocket::new(PortRange::privileged().descending());
        socket.failure = io::ErrorKind::PermissionDenied;

        let result = PortAllocator::new(PortRange::privileged()).acquire(&socket, any_v4());

        assert!(matches!(
            result,
            Err(RcmdError::PortExhausted { attempts: 512 })
        ));
        let attempts = socket.attempts.borrow();
        assert_eq!(attempts.len(), 1023 - 512 + 1);
        assert!(attempts.windows(2).all(|w| w[0] == w[1] + 1));
        assert_eq!(attempts.first(), Some(&1023));
        assert_eq!(attempts.last(), Some(&512));
    }

    #[test]
    fn test_unexpected_bind_error_aborts_scan() {
        let mut socket = FakeSocket::new([1023]);
        socket.failure = io::ErrorKind::InvalidInput;

        let result = PortAllocator::new(PortRange::privileged()).acquire(&socket, any_v4());

        assert!(matches!(
            result,
            Err(RcmdError::LookupFailed { port: 1023, .. })
        ));
        assert_eq!(socket.attempts.borrow().len(), 1);
    }

    #[test]
    fn test_range_below_continues_scan() {
        let range = PortRange::privileged();
        assert_eq!(range.below(1021), Some(PortRange { high: 1020, low: 512 }));
        assert_eq!(range.below(512), None);
        assert_eq!(range.below(5000), Some(range));
    }

    #[test]
    fn test_range_validation() {
        assert!(PortRange::new(1023, 512).is_ok());
        assert!(PortRange::new(600, 700).is_err());
        assert!(PortRange::new(10, 0).is_err());
        assert_eq!(PortRange::privileged().len(), 512);
        assert!(PortRange::privileged().contains(512));
        assert!(!PortRange::privileged().contains(1024));
    }

    #[tokio::test]
    async fn test_real_socket_binds_in_range() {
        // High ports so the test does not need privileges
        let range = PortRange::new(47999, 47000).unwrap();
        let socket = tokio::net::TcpSocket::new_v4().unwrap();

        let port = PortAllocator::new(range)
            .acquire(&socket, IpAddr::V4(Ipv4Addr::LOCALHOST))
            .unwrap();

        assert!(range.contains(port));
        assert_eq!(socket.local_addr().unwrap().port(), port);
    }
}
