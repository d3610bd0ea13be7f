//! Local accounts from the password database

use std::ffi::CString;
use std::io;
use std::path::{Path, PathBuf};

use nix::unistd::{self, Gid, Uid, User};

use rcmd_core::RcmdError;

/// Shell used when the password entry names none
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Search path handed to session programs
pub const DEFAULT_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// The account a session runs as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Login name
    pub name: String,
    /// User id
    pub uid: u32,
    /// Primary group id
    pub gid: u32,
    /// Home directory
    pub home: PathBuf,
    /// Login shell; may be empty
    pub shell: PathBuf,
}

impl Account {
    /// Whether this is the superuser
    pub fn is_root(&self) -> bool {
        self.uid == 0
    }

    /// Login shell, or `/bin/sh` if none is set
    pub fn shell(&self) -> &Path {
        if self.shell.as_os_str().is_empty() {
            Path::new(DEFAULT_SHELL)
        } else {
            &self.shell
        }
    }

    /// Directory to start in: the home directory, or `/` if it is missing
    pub fn working_dir(&self) -> &Path {
        if self.home.is_dir() {
            &self.home
        } else {
            Path::new("/")
        }
    }

    /// Environment for the session program
    pub fn environment(&self) -> Vec<(String, String)> {
        vec![
            ("USER".to_string(), self.name.clone()),
            ("LOGNAME".to_string(), self.name.clone()),
            ("HOME".to_string(), self.home.display().to_string()),
            ("SHELL".to_string(), self.shell().display().to_string()),
            ("PATH".to_string(), DEFAULT_PATH.to_string()),
        ]
    }

    /// Switch the process to this account's group list, gid and uid
    ///
    /// Without root privileges this only succeeds if the process already
    /// runs as the account.
    pub fn assume(&self) -> Result<(), RcmdError> {
        let uid = Uid::from_raw(self.uid);
        let gid = Gid::from_raw(self.gid);

        if !unistd::geteuid().is_root() {
            if unistd::geteuid() == uid {
                return Ok(());
            }
            return Err(RcmdError::auth(
                &self.name,
                "server lacks the privileges to switch accounts",
            ));
        }

        let name = CString::new(self.name.as_str())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        unistd::setgid(gid).map_err(io::Error::from)?;
        unistd::initgroups(&name, gid).map_err(io::Error::from)?;
        unistd::setuid(uid).map_err(io::Error::from)?;

        tracing::debug!(user = %self.name, uid = self.uid, gid = self.gid, "Switched credentials");
        Ok(())
    }
}

impl From<User> for Account {
    fn from(user: User) -> Self {
        Self {
            name: user.name,
            uid: user.uid.as_raw(),
            gid: user.gid.as_raw(),
            home: user.dir,
            shell: user.shell,
        }
    }
}

/// Where accounts are looked up
pub trait AccountDirectory {
    /// Find an account by name; unknown names are an authentication failure
    fn lookup(&self, name: &str) -> Result<Account, RcmdError>;
}

/// The system password database
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemAccounts;

impl AccountDirectory for SystemAccounts {
    fn lookup(&self, name: &str) -> Result<Account, RcmdError> {
        match User::from_name(name).map_err(io::Error::from)? {
            Some(user) => Ok(user.into()),
            None => Err(RcmdError::auth(name, "no such account")),
        }
    }
}
