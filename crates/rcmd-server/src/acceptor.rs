//! Server side of the handshake
//!
//! Verifies the peer, reads the request, authenticates it and answers with
//! the acknowledgement byte. Any failure before the acknowledgement is
//! reported to the client as a rejection with a one-line diagnostic.

use tokio::net::TcpStream;

use rcmd_core::{
    AuthRequest, Authenticator, Connector, PortRange, RcmdError, SessionContext, SessionDetail,
};
use rcmd_protocol::handshake::{parse_stderr_port, split_terminal};
use rcmd_protocol::io::{read_string, write_ack};
use rcmd_protocol::{Ack, ProtocolError};

use crate::account::{Account, AccountDirectory};
use crate::peer::Peer;

/// An authenticated session, ready to be launched
#[derive(Debug)]
pub struct Accepted {
    /// Request details and connections
    pub context: SessionContext,
    /// Local account the session runs as
    pub account: Account,
}

/// The fields of a request that passed authentication
struct Granted {
    client_user: String,
    server_user: String,
    detail: SessionDetail,
    auxiliary: Option<TcpStream>,
    account: Account,
}

/// Accepts `rshd` and `rlogind` requests on an established connection
pub struct Acceptor<'a> {
    connector: Connector,
    authenticator: &'a dyn Authenticator,
    accounts: &'a dyn AccountDirectory,
}

impl<'a> Acceptor<'a> {
    /// Create an acceptor
    ///
    /// `ports` is both the range clients must connect from and the range
    /// the error-stream connect-back is bound in.
    pub fn new(
        ports: PortRange,
        authenticator: &'a dyn Authenticator,
        accounts: &'a dyn AccountDirectory,
    ) -> Self {
        Self {
            connector: Connector::new(ports),
            authenticator,
            accounts,
        }
    }

    /// Run the shell handshake
    pub async fn accept_shell(&self, stream: TcpStream) -> Result<Accepted, RcmdError> {
        self.accept(stream, Service::Shell).await
    }

    /// Run the login handshake
    pub async fn accept_login(&self, stream: TcpStream) -> Result<Accepted, RcmdError> {
        self.accept(stream, Service::Login).await
    }

    async fn accept(&self, mut stream: TcpStream, service: Service) -> Result<Accepted, RcmdError> {
        let peer = Peer::identify(&stream)?;
        tracing::debug!(host = %peer.host, address = %peer.address, "Connection received");

        let granted = match service {
            Service::Shell => self.shell_request(&mut stream, &peer).await,
            Service::Login => self.login_request(&mut stream, &peer).await,
        };

        let granted = match granted {
            Ok(granted) => granted,
            Err(e) => {
                tracing::error!("{}", e);
                reject(&mut stream, &e).await;
                return Err(e);
            }
        };

        write_ack(&mut stream, &Ack::Accepted).await?;

        let context = SessionContext {
            client_user: granted.client_user,
            server_user: granted.server_user,
            detail: granted.detail,
            peer_host: peer.host,
            primary: stream,
            auxiliary: granted.auxiliary,
        };
        tracing::info!(%context, "Session accepted");

        Ok(Accepted {
            context,
            account: granted.account,
        })
    }

    async fn shell_request(&self, stream: &mut TcpStream, peer: &Peer) -> Result<Granted, RcmdError> {
        peer.verify_port(&self.connector.ports())?;

        let stderr_port = parse_stderr_port(&read_string(stream, "stderr port").await?)?;
        let auxiliary = match stderr_port {
            Some(port) => {
                let address = peer.stderr_address(port);
                let aux = self.connector.connect_back(address).await.map_err(|e| {
                    tracing::warn!(%address, "Connecting to stderr port failed");
                    e
                })?;
                Some(aux)
            }
            None => None,
        };

        let client_user = read_string(stream, "client user").await?;
        let server_user = read_string(stream, "server user").await?;
        let command = read_string(stream, "command").await?;

        let account = self.authorize(peer, &client_user, &server_user)?;
        Ok(Granted {
            client_user,
            server_user,
            detail: SessionDetail::Shell { command },
            auxiliary,
            account,
        })
    }

    async fn login_request(&self, stream: &mut TcpStream, peer: &Peer) -> Result<Granted, RcmdError> {
        peer.verify_port(&self.connector.ports())?;

        if !read_string(stream, "empty").await?.is_empty() {
            return Err(ProtocolError::UnexpectedField { field: "empty" }.into());
        }
        let client_user = read_string(stream, "client user").await?;
        let server_user = read_string(stream, "server user").await?;
        let (terminal, speed) = split_terminal(&read_string(stream, "terminal").await?);

        let account = self.authorize(peer, &client_user, &server_user)?;
        Ok(Granted {
            client_user,
            server_user,
            detail: SessionDetail::Login { terminal, speed },
            auxiliary: None,
            account,
        })
    }

    fn authorize(&self, peer: &Peer, client_user: &str, server_user: &str) -> Result<Account, RcmdError> {
        let request = AuthRequest {
            client_user: client_user.to_string(),
            server_user: server_user.to_string(),
            host: peer.host.clone(),
            address: peer.numeric_host(),
        };
        self.authenticator.authenticate(&request)?;
        self.accounts.lookup(server_user)
    }
}

#[derive(Debug, Clone, Copy)]
enum Service {
    Shell,
    Login,
}

/// Send the rejection byte and diagnostic; the connection is dropped anyway
async fn reject(stream: &mut TcpStream, error: &RcmdError) {
    let ack = Ack::rejected(error.peer_diagnostic());
    if let Err(e) = write_ack(stream, &ack).await {
        tracing::debug!("Could not send rejection: {}", e);
    }
}
