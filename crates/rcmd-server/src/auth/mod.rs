//! Authentication policies for incoming requests
//!
//! Two policies are available: the classic trusted-hosts files
//! (`hosts.equiv` and the account's `.rhosts`), or an explicit rule list
//! from the server configuration.

mod rhosts;
mod rules;

pub use rhosts::{HostsEntry, RhostsAuthenticator};
pub use rules::RulesAuthenticator;

use rcmd_core::config::{AuthConfig, AuthMethod};
use rcmd_core::Authenticator;

use crate::account::SystemAccounts;

/// Build the authenticator selected by the configuration
pub fn from_config(config: &AuthConfig) -> Box<dyn Authenticator> {
    match config.method {
        AuthMethod::Rhosts => Box::new(RhostsAuthenticator::new(
            config.hosts_equiv.clone(),
            SystemAccounts,
        )),
        AuthMethod::Rules => Box::new(RulesAuthenticator::new(config.rules.clone())),
    }
}
