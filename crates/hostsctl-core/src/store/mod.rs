// # Hosts Store
//
// Loads, saves, backs up, restores and verifies a hosts file on disk.
//
// ## Save Sequence
//
// 1. Privilege gate: writing the system hosts file requires root
// 2. Serialize the in-memory model
// 3. Copy the current on-disk bytes to a timestamped backup (abort on failure)
// 4. Write the new text to `<path>.tmp` and fsync it
// 5. Rename the temp file over the original
//
// Step 5 is the only step that modifies the canonical path, so any failure
// leaves the original untouched.
//
// ## Concurrency
//
// The store does not lock by itself. Mutating callers wrap load → mutate →
// save in `lock::with_lock` (or use `HostsStore::update`). Readers never need
// the lock: the rename guarantees they see either the old or the new file.
//
// ## Backup Naming
//
// `<path>.hostsctl.<YYYYMMDD-HHMMSS>.bak`, mode 0600. With a configured
// backup directory the file lands there under the same name. Backups are
// written through the same temp-file + rename primitive as the hosts file,
// and a destination that resolves to the hosts file itself is refused.

pub mod atomic;

use std::collections::HashMap;
use std::fs::Permissions;
use std::io;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::BufReader;
use tracing::{debug, info};

use crate::config::{HostsConfig, SYSTEM_HOSTS_PATH};
use crate::error::{Error, IoOperation, Result};
use crate::lock::{QUICK_LOCK_TIMEOUT, with_lock};
use crate::model::{BackupInfo, EntryId, HostsFile, Profile};
use crate::parser::{ParseMode, Parser};
use crate::validation;

pub use atomic::{temp_path_for, write_atomic};

/// `strftime` format of the backup timestamp
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Marker between the file name and the timestamp in backup names
const BACKUP_MARKER: &str = ".hostsctl.";

/// Backup file extension
const BACKUP_SUFFIX: &str = ".bak";

/// How a profile is written into the hosts file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyMode {
    /// The hosts file becomes exactly the profile's entries
    Replace,
    /// Profile entries are appended to the current entries
    Merge,
}

/// File-backed hosts store
///
/// Bound to one hosts file path and one [`ParseMode`] for its lifetime.
///
/// # Example
///
/// ```rust,no_run
/// use hostsctl_core::{Entry, HostsStore, ParseMode};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = HostsStore::new("/etc/hosts", ParseMode::Lenient);
///
///     // Lock, load, mutate, save, unlock
///     let id = store
///         .update(|hosts| Ok(hosts.add_entry(Entry::new("10.0.0.5", ["dev.local"]))))
///         .await?;
///     println!("added entry {id}");
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct HostsStore {
    path: PathBuf,
    parser: Parser,
    backup_dir: Option<PathBuf>,
    lock_timeout: Duration,
}

impl HostsStore {
    /// Create a store for `path`
    pub fn new(path: impl Into<PathBuf>, mode: ParseMode) -> Self {
        Self {
            path: path.into(),
            parser: Parser::new(mode),
            backup_dir: None,
            lock_timeout: QUICK_LOCK_TIMEOUT,
        }
    }

    /// Create a store from configuration
    pub fn from_config(config: &HostsConfig) -> Self {
        Self {
            path: config.hosts_path.clone(),
            parser: Parser::new(config.parse_mode),
            backup_dir: config.backup_dir.clone(),
            lock_timeout: config.lock_timeout(),
        }
    }

    /// Write backups into `dir`
    pub fn with_backup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = Some(dir.into());
        self
    }

    /// Set how long [`HostsStore::update`] waits for the lock
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// The hosts file this store manages
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load and parse the hosts file
    pub async fn load(&self) -> Result<HostsFile> {
        let mut hosts = self.parse_file(&self.path, self.parser).await?;
        hosts.path = self.path.clone();
        debug!(file = %self.path.display(), entries = hosts.len(), "hosts file loaded");
        Ok(hosts)
    }

    async fn parse_file(&self, path: &Path, parser: Parser) -> Result<HostsFile> {
        let file = fs::File::open(path)
            .await
            .map_err(|source| Error::io(IoOperation::Open, path, source))?;

        parser
            .parse_reader(BufReader::new(file))
            .await
            .map_err(|err| match err {
                Error::Io {
                    operation, source, ..
                } => Error::io(operation, path, source),
                other => other,
            })
    }

    /// Write `hosts_file` to the store's path with backup and atomic rename
    ///
    /// The store's path is the destination; `hosts_file.path` is not
    /// consulted. Fails before touching the disk if the target is the
    /// system hosts file and the process is not running as root, and
    /// before any destructive step if the backup cannot be made.
    pub async fn save(&self, hosts_file: &HostsFile) -> Result<()> {
        check_write_privileges(&self.path, is_elevated())?;

        let content = self.parser.serialize(hosts_file);

        let backup = self.copy_to_backup(&self.timestamped_backup_path()).await?;
        debug!(backup = %backup.path.display(), bytes = backup.size_bytes, "pre-save backup written");

        let permissions = fs::metadata(&self.path)
            .await
            .ok()
            .map(|meta| meta.permissions());

        write_atomic(&self.path, content.as_bytes(), permissions).await?;

        info!(
            file = %self.path.display(),
            entries = hosts_file.len(),
            "hosts file saved"
        );
        Ok(())
    }

    /// Copy the current file to `output`, or to a timestamped name if `None`
    ///
    /// The hosts file itself is not modified. An `output` that is the hosts
    /// file (directly or through a link) fails with [`IoOperation::Backup`].
    pub async fn backup(&self, output: Option<&Path>) -> Result<BackupInfo> {
        let target = match output {
            Some(path) if !path.as_os_str().is_empty() => path.to_path_buf(),
            _ => self.timestamped_backup_path(),
        };
        let info = self.copy_to_backup(&target).await?;
        info!(backup = %info.path.display(), bytes = info.size_bytes, "backup created");
        Ok(info)
    }

    /// Replace the hosts file with the contents of `backup_path`
    ///
    /// The backup is parsed with this store's parser and written through
    /// [`HostsStore::save`], which backs up the pre-restore state first.
    pub async fn restore(&self, backup_path: impl AsRef<Path>) -> Result<()> {
        let backup_path = backup_path.as_ref();
        check_write_privileges(&self.path, is_elevated())?;

        let mut hosts = self.parse_file(backup_path, self.parser).await?;
        hosts.path = self.path.clone();
        self.save(&hosts).await?;

        info!(
            file = %self.path.display(),
            backup = %backup_path.display(),
            "hosts file restored from backup"
        );
        Ok(())
    }

    /// Existing backups of this hosts file, oldest first
    pub async fn list_backups(&self) -> Result<Vec<BackupInfo>> {
        let dir = self.backup_location();
        let prefix = format!("{}{BACKUP_MARKER}", self.file_name());

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(Error::io(IoOperation::List, dir, source)),
        };

        let mut backups = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| Error::io(IoOperation::List, &dir, source))?
        {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !name.starts_with(&prefix) || !name.ends_with(BACKUP_SUFFIX) {
                continue;
            }
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            backups.push(BackupInfo {
                path: entry.path(),
                original_path: self.path.clone(),
                created_at: meta
                    .modified()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| Utc::now()),
                size_bytes: meta.len(),
            });
        }

        backups.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(backups)
    }

    /// Check the file for invalid entries and duplicate hostnames
    ///
    /// Returns human-readable issues; empty means clean. Never writes.
    ///
    /// The file is always parsed strictly, whatever this store's mode: a
    /// malformed line fails with [`Error::Parse`] naming the line instead of
    /// being skipped.
    pub async fn verify(&self) -> Result<Vec<String>> {
        let hosts = self.parse_file(&self.path, Parser::strict()).await?;
        let issues = verify_entries(&hosts);
        debug!(file = %self.path.display(), issues = issues.len(), "verification finished");
        Ok(issues)
    }

    /// Lock, load, apply `mutate`, save, unlock
    ///
    /// If `mutate` fails nothing is written. The lock is released on every
    /// path.
    pub async fn update<T, F>(&self, mutate: F) -> Result<T>
    where
        F: FnOnce(&mut HostsFile) -> Result<T>,
    {
        with_lock(&self.path, self.lock_timeout, || async move {
            let mut hosts = self.load().await?;
            let outcome = mutate(&mut hosts)?;
            self.save(&hosts).await?;
            Ok(outcome)
        })
        .await
    }

    /// Capture the current entries as a new profile
    pub async fn snapshot(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Profile> {
        let hosts = self.load().await?;
        Ok(Profile::new(name, description, hosts.entries))
    }

    /// Write a profile into the hosts file
    ///
    /// Does not take the lock; callers wrap it like any other mutation.
    /// Returns the document that was saved.
    pub async fn apply_profile(&self, profile: &Profile, mode: ApplyMode) -> Result<HostsFile> {
        let hosts = match mode {
            ApplyMode::Replace => {
                let mut hosts = HostsFile::new(&self.path);
                for entry in &profile.entries {
                    hosts.add_entry(entry.clone());
                }
                hosts
            }
            ApplyMode::Merge => {
                let mut hosts = self.load().await?;
                for entry in &profile.entries {
                    hosts.add_entry(entry.clone());
                }
                hosts
            }
        };

        self.save(&hosts).await?;
        info!(profile = %profile.name, ?mode, entries = profile.entries.len(), "profile applied");
        Ok(hosts)
    }

    async fn copy_to_backup(&self, target: &Path) -> Result<BackupInfo> {
        let backup_err = |path: &Path, source| Error::io(IoOperation::Backup, path, source);

        if is_same_file(target, &self.path).await {
            return Err(backup_err(
                target,
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "backup destination is the hosts file itself",
                ),
            ));
        }

        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| backup_err(parent, source))?;
        }

        let contents = fs::read(&self.path)
            .await
            .map_err(|source| backup_err(&self.path, source))?;

        write_atomic(target, &contents, Some(Permissions::from_mode(0o600)))
            .await
            .map_err(|err| match err {
                Error::Io { path, source, .. } => backup_err(&path, source),
                other => other,
            })?;

        Ok(BackupInfo {
            path: target.to_path_buf(),
            original_path: self.path.clone(),
            created_at: Utc::now(),
            size_bytes: contents.len() as u64,
        })
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "hosts".to_string())
    }

    fn backup_location(&self) -> PathBuf {
        match &self.backup_dir {
            Some(dir) => dir.clone(),
            None => self
                .path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf),
        }
    }

    fn timestamped_backup_path(&self) -> PathBuf {
        self.backup_path_at(Local::now())
    }

    fn backup_path_at(&self, when: DateTime<Local>) -> PathBuf {
        let stamp = when.format(BACKUP_TIMESTAMP_FORMAT);
        match &self.backup_dir {
            Some(dir) => dir.join(format!(
                "{}{BACKUP_MARKER}{stamp}{BACKUP_SUFFIX}",
                self.file_name()
            )),
            None => {
                let mut path = self.path.as_os_str().to_os_string();
                path.push(format!("{BACKUP_MARKER}{stamp}{BACKUP_SUFFIX}"));
                PathBuf::from(path)
            }
        }
    }
}

/// Whether both paths exist and name the same inode
async fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::metadata(a).await, fs::metadata(b).await) {
        (Ok(a), Ok(b)) => a.dev() == b.dev() && a.ino() == b.ino(),
        _ => false,
    }
}

/// Whether the current process runs with root privileges
pub fn is_elevated() -> bool {
    nix::unistd::geteuid().is_root()
}

/// Refuse writes to the system hosts file without elevated privileges
pub fn check_write_privileges(path: &Path, elevated: bool) -> Result<()> {
    if path == Path::new(SYSTEM_HOSTS_PATH) && !elevated {
        return Err(Error::permission_denied(format!(
            "modifying {SYSTEM_HOSTS_PATH} requires root privileges (run with sudo)"
        )));
    }
    Ok(())
}

/// Collect verification issues for an in-memory document
///
/// Per entry: missing IP or names, invalid IP, invalid hostnames. Across
/// entries: each hostname owned by more than one entry is reported once,
/// listing every owning id. Hostname comparison is case-sensitive.
pub fn verify_entries(hosts: &HostsFile) -> Vec<String> {
    let mut issues = Vec::new();
    let mut owners: Vec<(&str, Vec<EntryId>)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for entry in &hosts.entries {
        if !entry.is_valid() {
            issues.push(format!(
                "entry {}: invalid entry (missing IP or names)",
                entry.id
            ));
            continue;
        }

        if !validation::is_valid_ip(&entry.ip) {
            issues.push(format!("entry {}: invalid IP address: {}", entry.id, entry.ip));
        }

        for name in &entry.names {
            if !validation::is_valid_hostname(name) {
                issues.push(format!("entry {}: invalid hostname: {name}", entry.id));
            }

            let slot = *index.entry(name.as_str()).or_insert_with(|| {
                owners.push((name.as_str(), Vec::new()));
                owners.len() - 1
            });
            let ids = &mut owners[slot].1;
            if ids.last() != Some(&entry.id) {
                ids.push(entry.id);
            }
        }
    }

    for (name, ids) in owners {
        if ids.len() > 1 {
            let ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
            issues.push(format!(
                "duplicate hostname '{name}' found in entries: {}",
                ids.join(", ")
            ));
        }
    }

    issues
}
