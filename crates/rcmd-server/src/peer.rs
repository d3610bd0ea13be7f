//! The client on the other end of an inherited connection

use std::net::{IpAddr, SocketAddr};

use tokio::net::TcpStream;

use rcmd_core::{PortRange, RcmdError};

/// Address and name of the connecting client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    /// Source address, IPv4-mapped addresses unmapped
    pub address: SocketAddr,
    /// Host name from a reverse lookup, or the numeric address
    pub host: String,
}

impl Peer {
    /// Identify the peer of a connected stream
    pub fn identify(stream: &TcpStream) -> Result<Self, RcmdError> {
        let address = unmap(stream.peer_addr()?);
        Ok(Self {
            address,
            host: host_name(address.ip()),
        })
    }

    /// Numeric address without the port
    pub fn numeric_host(&self) -> String {
        self.address.ip().to_string()
    }

    /// Require the connection to come from a reserved port
    pub fn verify_port(&self, ports: &PortRange) -> Result<(), RcmdError> {
        let port = self.address.port();
        if ports.contains(port) {
            return Ok(());
        }
        Err(RcmdError::UnprivilegedSource {
            peer: self.host.clone(),
            port,
        })
    }

    /// Address of the client's stderr listener
    pub fn stderr_address(&self, port: u16) -> SocketAddr {
        SocketAddr::new(self.address.ip(), port)
    }
}

/// Turn an IPv4-mapped IPv6 address into plain IPv4
pub fn unmap(address: SocketAddr) -> SocketAddr {
    SocketAddr::new(address.ip().to_canonical(), address.port())
}

fn host_name(ip: IpAddr) -> String {
    match dns_lookup::lookup_addr(&ip) {
        Ok(name) => name,
        Err(e) => {
            tracing::debug!(%ip, error = %e, "Reverse lookup failed, using address");
            ip.to_string()
        }
    }
}
