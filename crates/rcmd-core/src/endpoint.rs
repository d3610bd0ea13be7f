//! Target address resolution

use std::fmt;
use std::net::SocketAddr;

use dns_lookup::{getaddrinfo, AddrInfoHints, SockType};

use crate::error::RcmdError;

/// One resolved candidate address of a target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Numeric socket address
    pub address: SocketAddr,
    /// Host name as given by the user
    pub host: String,
}

impl Endpoint {
    /// Create an endpoint
    pub fn new(address: SocketAddr, host: impl Into<String>) -> Self {
        Self {
            address,
            host: host.into(),
        }
    }

    /// Numeric form of the host address
    pub fn numeric_host(&self) -> String {
        self.address.ip().to_string()
    }

    /// Port number
    pub fn port(&self) -> u16 {
        self.address.port()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} port {}", self.numeric_host(), self.port())
    }
}

/// Resolve a host and service to stream endpoints, in resolver order
///
/// `service` may be a name from the services database (`login`, `shell`) or
/// a decimal port number.
pub fn resolve(host: &str, service: &str) -> Result<Vec<Endpoint>, RcmdError> {
    let hints = AddrInfoHints {
        socktype: SockType::Stream.into(),
        ..AddrInfoHints::default()
    };

    let target = format!("{} ({})", host, service);
    let addresses = getaddrinfo(Some(host), Some(service), Some(hints)).map_err(|e| {
        RcmdError::ResolutionFailure {
            target: target.clone(),
            message: std::io::Error::from(e).to_string(),
        }
    })?;

    let mut endpoints: Vec<Endpoint> = Vec::new();
    for info in addresses.filter_map(|r| r.ok()) {
        let endpoint = Endpoint::new(info.sockaddr, host);
        if !endpoints.contains(&endpoint) {
            endpoints.push(endpoint);
        }
    }

    if endpoints.is_empty() {
        return Err(RcmdError::ResolutionFailure {
            target,
            message: "no addresses found".to_string(),
        });
    }

    tracing::debug!(host, service, count = endpoints.len(), "Resolved target");
    Ok(endpoints)
}
