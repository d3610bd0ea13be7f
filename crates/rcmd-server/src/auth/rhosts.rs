//! Trusted-hosts authentication
//!
//! A request is trusted when `hosts.equiv` lists the client host (never for
//! root), or when the target account's `~/.rhosts` lists the client host and
//! user. Each non-comment line holds a host and an optional user:
//!
//! ```text
//! trusted.example          # same user name on both ends
//! trusted.example alice    # alice from trusted.example
//! + bob                    # bob from anywhere
//! -untrusted.example       # never trust this host
//! ```
//!
//! Missing files trust nobody. A `.rhosts` file must belong to the account
//! or to root and must not be writable by group or others.

use std::fs;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use rcmd_core::{AuthRequest, Authenticator, RcmdError};

use crate::account::{Account, AccountDirectory};

/// Name of the per-account trust file
pub const RHOSTS_FILE: &str = ".rhosts";

/// One parsed line of a trust file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostsEntry {
    host: Pattern,
    user: Option<Pattern>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Pattern {
    Any,
    Name(String),
    Not(String),
}

impl Pattern {
    fn parse(token: &str) -> Self {
        match token {
            "+" => Self::Any,
            _ => match token.strip_prefix('-') {
                Some(name) if !name.is_empty() => Self::Not(name.to_string()),
                _ => Self::Name(token.trim_start_matches('+').to_string()),
            },
        }
    }
}

/// What a matching entry says about a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Trust,
    Deny,
}

impl HostsEntry {
    /// Parse one line; blank lines and comments give `None`
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.split('#').next().unwrap_or("").trim();
        let mut tokens = line.split_whitespace();
        let host = Pattern::parse(tokens.next()?);
        let user = tokens.next().map(Pattern::parse);
        Some(Self { host, user })
    }

    fn verdict(&self, request: &AuthRequest) -> Option<Verdict> {
        let host_matches = |name: &str| {
            name.eq_ignore_ascii_case(&request.host) || name == request.address
        };

        match &self.host {
            Pattern::Not(name) if host_matches(name.as_str()) => return Some(Verdict::Deny),
            Pattern::Not(_) => return None,
            Pattern::Name(name) if !host_matches(name.as_str()) => return None,
            Pattern::Name(_) | Pattern::Any => {}
        }

        match &self.user {
            None if request.client_user == request.server_user => Some(Verdict::Trust),
            None => None,
            Some(Pattern::Any) => Some(Verdict::Trust),
            Some(Pattern::Name(user)) if *user == request.client_user => Some(Verdict::Trust),
            Some(Pattern::Not(user)) if *user == request.client_user => Some(Verdict::Deny),
            Some(_) => None,
        }
    }
}

/// Decide a request against the contents of one trust file
///
/// The first entry with an opinion decides.
fn trusted_by(contents: &str, request: &AuthRequest) -> bool {
    contents
        .lines()
        .filter_map(HostsEntry::parse)
        .find_map(|entry| entry.verdict(request))
        == Some(Verdict::Trust)
}

/// Read a trust file; a missing file reads as empty
fn read_trust_file(path: &Path) -> io::Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Whether a `.rhosts` file is safe to honor for `account`
fn rhosts_is_secure(path: &Path, account: &Account) -> io::Result<bool> {
    let meta = fs::symlink_metadata(path)?;
    let owner_ok = meta.uid() == account.uid || meta.uid() == 0;
    let mode_ok = meta.mode() & 0o022 == 0;
    Ok(meta.is_file() && owner_ok && mode_ok)
}

/// Authenticates against `hosts.equiv` and the account's `.rhosts`
pub struct RhostsAuthenticator<D> {
    hosts_equiv: PathBuf,
    accounts: D,
}

impl<D: AccountDirectory> RhostsAuthenticator<D> {
    /// Create an authenticator reading `hosts_equiv` and accounts from `accounts`
    pub fn new(hosts_equiv: PathBuf, accounts: D) -> Self {
        Self {
            hosts_equiv,
            accounts,
        }
    }

    fn check_equiv(&self, account: &Account, request: &AuthRequest) -> io::Result<bool> {
        if account.is_root() {
            return Ok(false);
        }
        Ok(read_trust_file(&self.hosts_equiv)?
            .map(|contents| trusted_by(&contents, request))
            .unwrap_or(false))
    }

    fn check_rhosts(&self, account: &Account, request: &AuthRequest) -> io::Result<bool> {
        let path = account.home.join(RHOSTS_FILE);
        let Some(contents) = read_trust_file(&path)? else {
            return Ok(false);
        };
        if !rhosts_is_secure(&path, account)? {
            tracing::warn!(path = %path.display(), "Ignoring insecure trust file");
            return Ok(false);
        }
        Ok(trusted_by(&contents, request))
    }
}

impl<D: AccountDirectory> Authenticator for RhostsAuthenticator<D> {
    fn authenticate(&self, request: &AuthRequest) -> Result<(), RcmdError> {
        let account = self.accounts.lookup(&request.server_user)?;

        if self.check_equiv(&account, request)? {
            tracing::debug!(file = %self.hosts_equiv.display(), "Host trusted system-wide");
            return Ok(());
        }
        if self.check_rhosts(&account, request)? {
            tracing::debug!(user = %account.name, "Host trusted by account");
            return Ok(());
        }

        Err(RcmdError::auth(
            &request.server_user,
            format!(
                "{}@{} is not a trusted user",
                request.client_user, request.host
            ),
        ))
    }
}
