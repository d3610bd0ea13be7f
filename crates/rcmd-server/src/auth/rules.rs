//! Rule-list authentication

use rcmd_core::config::AuthRule;
use rcmd_core::{AuthRequest, Authenticator, RcmdError};

/// Accepts requests covered by a configured rule
pub struct RulesAuthenticator {
    rules: Vec<AuthRule>,
}

impl RulesAuthenticator {
    /// Create an authenticator from a rule list; the first match wins
    pub fn new(rules: Vec<AuthRule>) -> Self {
        Self { rules }
    }
}

impl Authenticator for RulesAuthenticator {
    fn authenticate(&self, request: &AuthRequest) -> Result<(), RcmdError> {
        let matched = self.rules.iter().position(|rule| {
            rule.matches(
                &request.host,
                &request.address,
                &request.client_user,
                &request.server_user,
            )
        });

        match matched {
            Some(index) => {
                tracing::debug!(rule = index, "Request matched authentication rule");
                Ok(())
            }
            None => Err(RcmdError::auth(
                &request.server_user,
                format!(
                    "no rule trusts {}@{}",
                    request.client_user, request.host
                ),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(client_user: &str, server_user: &str) -> AuthRequest {
        AuthRequest {
            client_user: client_user.into(),
            server_user: server_user.into(),
            host: "client.example".into(),
            address: "10.0.0.7".into(),
        }
    }

    fn rule(host: &str, client_user: &str, server_user: &str) -> AuthRule {
        AuthRule {
            host: host.into(),
            client_user: client_user.into(),
            server_user: server_user.into(),
        }
    }

    #[test]
    fn test_matching_rule_accepts() {
        let auth = RulesAuthenticator::new(vec![
            rule("other.example", "*", "*"),
            rule("client.example", "alice", "*"),
        ]);
        assert!(auth.authenticate(&request("alice", "bob")).is_ok());
    }

    #[test]
    fn test_no_rules_refuses() {
        let auth = RulesAuthenticator::new(Vec::new());
        let err = auth.authenticate(&request("alice", "alice")).unwrap_err();
        assert!(matches!(err, RcmdError::AuthenticationFailure { ref user, .. } if user == "alice"));
    }

    #[test]
    fn test_address_rule() {
        let auth = RulesAuthenticator::new(vec![rule("10.0.0.7", "*", "root")]);
        assert!(auth.authenticate(&request("anyone", "root")).is_ok());
        assert!(auth.authenticate(&request("anyone", "bob")).is_err());
    }
}
