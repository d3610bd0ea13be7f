//! Authentication collaborator

use crate::error::RcmdError;

/// What the server knows about a request when deciding whether to trust it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequest {
    /// Account name claimed on the client host
    pub client_user: String,
    /// Requested account on this host
    pub server_user: String,
    /// Peer host name, or the numeric address if it has none
    pub host: String,
    /// Numeric peer address
    pub address: String,
}

/// Decides whether a peer may act as `server_user`
///
/// Implementations block until they have an answer; the server has nothing
/// else to do in the meantime.
pub trait Authenticator {
    /// `Ok(())` to accept, `AuthenticationFailure` to refuse
    fn authenticate(&self, request: &AuthRequest) -> Result<(), RcmdError>;
}

impl<A: Authenticator + ?Sized> Authenticator for Box<A> {
    fn authenticate(&self, request: &AuthRequest) -> Result<(), RcmdError> {
        (**self).authenticate(request)
    }
}
