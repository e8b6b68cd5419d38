//! Shared fixtures for the hostsctl contract tests
//!
//! Every fixture lives in its own temporary directory so tests can run in
//! parallel and never touch the system hosts file.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use hostsctl_core::{HostsStore, ParseMode};
use tempfile::TempDir;

/// Hosts text used by most tests
pub const SAMPLE_HOSTS: &str = "\
# Managed by hostsctl tests
127.0.0.1\tlocalhost
::1\tlocalhost ip6-localhost
192.168.1.10\tweb.local www.local\t# web server
# 192.168.1.20\told.local
";

/// A hosts file inside a private temp directory
pub struct HostsFixture {
    dir: TempDir,
    path: PathBuf,
}

impl HostsFixture {
    /// Create the fixture with `content` written to `<tmp>/hosts`
    pub fn new(content: &str) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("hosts");
        std::fs::write(&path, content).expect("write fixture");
        Self { dir, path }
    }

    /// Fixture holding [`SAMPLE_HOSTS`]
    pub fn sample() -> Self {
        Self::new(SAMPLE_HOSTS)
    }

    /// Path of the hosts file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The temp directory
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// A lenient store bound to the fixture
    pub fn store(&self) -> HostsStore {
        HostsStore::new(&self.path, ParseMode::Lenient)
    }

    /// A strict store bound to the fixture
    pub fn strict_store(&self) -> HostsStore {
        HostsStore::new(&self.path, ParseMode::Strict)
    }

    /// Current bytes of the hosts file
    pub fn read(&self) -> Vec<u8> {
        std::fs::read(&self.path).expect("read fixture")
    }

    /// Current text of the hosts file
    pub fn read_string(&self) -> String {
        std::fs::read_to_string(&self.path).expect("read fixture")
    }

    /// Names of files in the fixture directory, sorted
    pub fn dir_listing(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.dir.path())
            .expect("read_dir")
            .map(|entry| entry.expect("dir entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}
