//! Configuration types for hostsctl
//!
//! A [`HostsConfig`] is built once at startup (by the binary, from the
//! environment and command-line flags) and passed into the store and
//! profile constructors. Nothing in the core reads environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::parser::ParseMode;

/// Canonical system hosts file location
pub const SYSTEM_HOSTS_PATH: &str = "/etc/hosts";

/// Main hostsctl configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostsConfig {
    /// Hosts file to manage
    #[serde(default = "default_hosts_path")]
    pub hosts_path: PathBuf,

    /// How malformed lines are handled when loading
    #[serde(default)]
    pub parse_mode: ParseMode,

    /// How long mutating commands wait for the lock (in seconds)
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,

    /// Directory for automatic and manual backups
    ///
    /// When unset, backups are written next to the hosts file.
    #[serde(default)]
    pub backup_dir: Option<PathBuf>,

    /// Directory holding saved profiles
    #[serde(default = "default_profiles_dir")]
    pub profiles_dir: PathBuf,
}

impl HostsConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self {
            hosts_path: default_hosts_path(),
            parse_mode: ParseMode::default(),
            lock_timeout_secs: default_lock_timeout_secs(),
            backup_dir: None,
            profiles_dir: default_profiles_dir(),
        }
    }

    /// Set the hosts file path
    pub fn with_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.hosts_path = path.into();
        self
    }

    /// Set the parse mode
    pub fn with_parse_mode(mut self, mode: ParseMode) -> Self {
        self.parse_mode = mode;
        self
    }

    /// Set the lock timeout
    pub fn with_lock_timeout_secs(mut self, secs: u64) -> Self {
        self.lock_timeout_secs = secs;
        self
    }

    /// Write backups into `dir` instead of next to the hosts file
    pub fn with_backup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = Some(dir.into());
        self
    }

    /// Set the profiles directory
    pub fn with_profiles_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.profiles_dir = dir.into();
        self
    }

    /// Lock timeout as a [`Duration`]
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    /// Whether the configured hosts file is the system one
    pub fn is_system_hosts(&self) -> bool {
        self.hosts_path == Path::new(SYSTEM_HOSTS_PATH)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.hosts_path.as_os_str().is_empty() {
            return Err(crate::Error::config("Hosts file path cannot be empty"));
        }
        if self.hosts_path.file_name().is_none() {
            return Err(crate::Error::config(format!(
                "Hosts file path must name a file: {}",
                self.hosts_path.display()
            )));
        }
        if !(1..=300).contains(&self.lock_timeout_secs) {
            return Err(crate::Error::config(format!(
                "Lock timeout must be between 1 and 300 seconds. Got: {}",
                self.lock_timeout_secs
            )));
        }
        if self.profiles_dir.as_os_str().is_empty() {
            return Err(crate::Error::config("Profiles directory cannot be empty"));
        }
        if let Some(dir) = &self.backup_dir
            && dir.as_os_str().is_empty()
        {
            return Err(crate::Error::config("Backup directory cannot be empty"));
        }
        Ok(())
    }
}

impl Default for HostsConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn default_hosts_path() -> PathBuf {
    PathBuf::from(SYSTEM_HOSTS_PATH)
}

fn default_lock_timeout_secs() -> u64 {
    5
}

/// `<user config dir>/hostsctl/profiles`
///
/// Falls back to a relative `.hostsctl/profiles` when no config directory
/// can be determined.
pub fn default_profiles_dir() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("hostsctl").join("profiles"))
        .unwrap_or_else(|| PathBuf::from(".hostsctl").join("profiles"))
}
