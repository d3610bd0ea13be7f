//! Connection establishment
//!
//! Opens the primary connection from a privileged port for both client
//! roles, the listening socket for the shell client's error stream, and the
//! server's connect-back to that socket.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpSocket, TcpStream};

use crate::endpoint::{resolve, Endpoint};
use crate::error::RcmdError;
use crate::port::{unspecified_for, PortAllocator, PortRange};

/// Progress of the candidate-address scan
#[derive(Debug, Clone)]
pub enum ConnectEvent {
    /// About to try a candidate address
    Trying(Endpoint),
    /// The candidate accepted the connection
    Connected,
    /// The candidate failed; the scan moves on
    Failed(String),
}

type ProgressFn = Box<dyn Fn(&ConnectEvent) + Send + Sync>;

/// A primary connection and the reserved port it originates from
#[derive(Debug)]
pub struct PrimaryConnection {
    /// The connected stream
    pub stream: TcpStream,
    /// The candidate that accepted
    pub endpoint: Endpoint,
    /// Local source port
    pub local_port: u16,
}

/// Listening socket for the server's error-stream callback
#[derive(Debug)]
pub struct StderrListener {
    listener: TcpListener,
    port: u16,
}

impl StderrListener {
    /// Port advertised in the handshake
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Accept the callback and close the listener
    ///
    /// The callback must come from a port in `allowed`.
    pub async fn accept(self, allowed: PortRange) -> Result<TcpStream, RcmdError> {
        let (stream, peer) = self.listener.accept().await?;
        if !allowed.contains(peer.port()) {
            return Err(RcmdError::UnprivilegedSource {
                peer: peer.ip().to_string(),
                port: peer.port(),
            });
        }
        tracing::debug!(%peer, "Accepted stderr connection");
        Ok(stream)
    }
}

/// Opens connections from reserved ports
pub struct Connector {
    ports: PortRange,
    progress: Option<ProgressFn>,
}

impl Connector {
    /// Create a connector drawing source ports from `ports`
    pub fn new(ports: PortRange) -> Self {
        Self {
            ports,
            progress: None,
        }
    }

    /// Report each step of the candidate scan to `progress`
    pub fn with_progress(mut self, progress: impl Fn(&ConnectEvent) + Send + Sync + 'static) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    /// The configured source-port range
    pub fn ports(&self) -> PortRange {
        self.ports
    }

    fn report(&self, event: ConnectEvent) {
        if let Some(progress) = &self.progress {
            progress(&event);
        }
    }

    /// Primary connection for a login session
    pub async fn connect_login(&self, host: &str, service: &str) -> Result<PrimaryConnection, RcmdError> {
        let endpoints = resolve(host, service)?;
        self.connect_any(host, &endpoints).await
    }

    /// Primary connection for a shell session plus the stderr listener
    pub async fn connect_shell(
        &self,
        host: &str,
        service: &str,
    ) -> Result<(PrimaryConnection, StderrListener), RcmdError> {
        let endpoints = resolve(host, service)?;
        let primary = self.connect_any(host, &endpoints).await?;
        let listener = self.listen_below(primary.local_port, &primary.endpoint.address)?;
        Ok((primary, listener))
    }

    /// Try the candidates in order, each from a fresh privileged socket
    ///
    /// A candidate that cannot get a socket, a reserved port, or a connection
    /// is skipped. Fails with `ConnectFailure` when none is left.
    pub async fn connect_any(
        &self,
        host: &str,
        endpoints: &[Endpoint],
    ) -> Result<PrimaryConnection, RcmdError> {
        for endpoint in endpoints {
            self.report(ConnectEvent::Trying(endpoint.clone()));

            let socket = match new_socket(&endpoint.address) {
                Ok(socket) => socket,
                Err(e) => {
                    self.report(ConnectEvent::Failed(format!("Could not open socket: {}", e)));
                    continue;
                }
            };

            let local_port = match PortAllocator::new(self.ports)
                .acquire(&socket, unspecified_for(&endpoint.address))
            {
                Ok(port) => port,
                Err(e @ RcmdError::PortExhausted { .. }) => {
                    self.report(ConnectEvent::Failed(e.to_string()));
                    continue;
                }
                Err(e) => return Err(e),
            };

            match socket.connect(endpoint.address).await {
                Ok(stream) => {
                    self.report(ConnectEvent::Connected);
                    tracing::info!(%endpoint, local_port, "Connected");
                    return Ok(PrimaryConnection {
                        stream,
                        endpoint: endpoint.clone(),
                        local_port,
                    });
                }
                Err(e) => {
                    self.report(ConnectEvent::Failed(format!("Connection failed: {}", e)));
                }
            }
        }

        Err(RcmdError::ConnectFailure {
            target: host.to_string(),
        })
    }

    /// Listen for the error-stream callback on the next lower free port
    ///
    /// Continues the descending scan below `primary_port` with a backlog of 1.
    pub fn listen_below(
        &self,
        primary_port: u16,
        family: &SocketAddr,
    ) -> Result<StderrListener, RcmdError> {
        let range = self
            .ports
            .below(primary_port)
            .ok_or(RcmdError::PortExhausted { attempts: 0 })?;

        let socket = new_socket(family)?;
        let port = PortAllocator::new(range).acquire(&socket, unspecified_for(family))?;
        let listener = socket.listen(1)?;

        tracing::debug!(port, "Listening for stderr connection");
        Ok(StderrListener { listener, port })
    }

    /// Connect back to `peer` from a privileged port (server side)
    pub async fn connect_back(&self, peer: SocketAddr) -> Result<TcpStream, RcmdError> {
        let socket = new_socket(&peer)?;
        let local_port = PortAllocator::new(self.ports).acquire(&socket, unspecified_for(&peer))?;

        tracing::debug!(%peer, local_port, "Connecting back for stderr");
        let stream = socket.connect(peer).await?;
        Ok(stream)
    }
}

fn new_socket(family: &SocketAddr) -> std::io::Result<TcpSocket> {
    match family {
        SocketAddr::V4(_) => TcpSocket::new_v4(),
        SocketAddr::V6(_) => TcpSocket::new_v6(),
    }
}
