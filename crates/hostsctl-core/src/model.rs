//! In-memory hosts file model
//!
//! A [`HostsFile`] is an ordered list of [`Entry`] values; order is the
//! on-disk line order. Entry ids are assigned when a document is parsed or
//! an entry is added, and are only meaningful within one in-memory
//! `HostsFile`: they are recomputed on every parse, so callers that need a
//! stable reference across separate invocations must match on IP and names.
//!
//! All operations here are synchronous and free of I/O.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::validation;

/// Entry identifier, unique within one in-memory [`HostsFile`]
pub type EntryId = u32;

/// A single hosts file line: one IP mapped to one or more hostnames
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Identifier assigned on parse or add
    #[serde(default)]
    pub id: EntryId,
    /// IP address (IPv4 or IPv6)
    pub ip: String,
    /// Hostnames for this IP, in line order
    pub names: Vec<String>,
    /// Trailing comment, empty if none
    #[serde(default)]
    pub comment: String,
    /// Whether the line is commented out
    #[serde(default)]
    pub disabled: bool,
    /// Original line text, kept for diagnostics only
    #[serde(skip)]
    pub raw: Option<String>,
}

impl Entry {
    /// Create an enabled entry with no comment
    pub fn new<I, S>(ip: impl Into<String>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: 0,
            ip: ip.into(),
            names: names.into_iter().map(Into::into).collect(),
            comment: String::new(),
            disabled: false,
            raw: None,
        }
    }

    /// Set the comment
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Mark the entry as disabled
    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    /// An entry is valid when it has an IP and at least one hostname
    pub fn is_valid(&self) -> bool {
        !self.ip.is_empty() && !self.names.is_empty()
    }

    /// Run the field validators over the IP, every hostname and the comment
    ///
    /// Returns the first failure.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::validate_ip(&self.ip)?;
        if let Some(err) = validation::validate_hostnames(&self.names).into_iter().next() {
            return Err(err);
        }
        validation::validate_comment(&self.comment)
    }

    /// Whether `name` appears in this entry's hostnames (case-sensitive)
    pub fn has_name(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Compare everything except the id and the raw line
    pub fn same_content(&self, other: &Entry) -> bool {
        self.ip == other.ip
            && self.names == other.names
            && self.comment == other.comment
            && self.disabled == other.disabled
    }
}

/// Canonical line form: `[# ]IP<TAB>name[<TAB>name...][<TAB># comment]`
impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.disabled {
            f.write_str("# ")?;
        }
        f.write_str(&self.ip)?;
        for name in &self.names {
            write!(f, "\t{name}")?;
        }
        if !self.comment.is_empty() {
            write!(f, "\t# {}", self.comment)?;
        }
        Ok(())
    }
}

/// A complete hosts document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostsFile {
    /// Entries in on-disk order
    pub entries: Vec<Entry>,
    /// Path the document was loaded from
    pub path: PathBuf,
}

impl HostsFile {
    /// Create an empty document bound to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            entries: Vec::new(),
            path: path.into(),
        }
    }

    /// Create a document from existing entries, keeping their ids
    pub fn with_entries(path: impl Into<PathBuf>, entries: Vec<Entry>) -> Self {
        Self {
            entries,
            path: path.into(),
        }
    }

    /// Path the document belongs to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the document has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append an entry, assigning it `max(existing ids) + 1` (or 1 if empty)
    ///
    /// If the maximum is already [`EntryId::MAX`] the lowest unused id is
    /// taken instead. Returns the assigned id.
    pub fn add_entry(&mut self, mut entry: Entry) -> EntryId {
        let id = match self.entries.iter().map(|e| e.id).max() {
            None => 1,
            Some(max) => max.checked_add(1).unwrap_or_else(|| self.lowest_free_id()),
        };
        entry.id = id;
        self.entries.push(entry);
        id
    }

    fn lowest_free_id(&self) -> EntryId {
        let used: HashSet<EntryId> = self.entries.iter().map(|e| e.id).collect();
        (1..EntryId::MAX)
            .find(|id| !used.contains(id))
            .unwrap_or(EntryId::MAX)
    }

    /// Remove the first entry with `id`; remaining entries keep their ids
    pub fn remove_entry(&mut self, id: EntryId) -> bool {
        match self.position(id) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Re-enable the entry with `id`
    pub fn enable_entry(&mut self, id: EntryId) -> bool {
        self.set_disabled(id, false)
    }

    /// Comment out the entry with `id`
    pub fn disable_entry(&mut self, id: EntryId) -> bool {
        self.set_disabled(id, true)
    }

    fn set_disabled(&mut self, id: EntryId, disabled: bool) -> bool {
        match self.find_by_id_mut(id) {
            Some(entry) => {
                entry.disabled = disabled;
                true
            }
            None => false,
        }
    }

    fn position(&self, id: EntryId) -> Option<usize> {
        self.entries.iter().position(|e| e.id == id)
    }

    /// Look up an entry by id
    pub fn find_by_id(&self, id: EntryId) -> Option<&Entry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Look up an entry by id for in-place modification
    pub fn find_by_id_mut(&mut self, id: EntryId) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|e| e.id == id)
    }

    /// Every entry whose hostnames contain `name` exactly, each at most once
    pub fn find_by_name(&self, name: &str) -> Vec<&Entry> {
        self.entries.iter().filter(|e| e.has_name(name)).collect()
    }

    /// Ids of every entry containing `name`
    pub fn ids_by_name(&self, name: &str) -> Vec<EntryId> {
        self.find_by_name(name).into_iter().map(|e| e.id).collect()
    }

    /// Entries that are not commented out
    pub fn enabled(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter().filter(|e| !e.disabled)
    }
}

/// A named, persistable snapshot of hosts entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Profile name (also its storage key)
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Entries in the snapshot
    #[serde(default)]
    pub entries: Vec<Entry>,
    /// When the profile was first saved
    pub created_at: DateTime<Utc>,
    /// When the profile was last modified
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Create a profile timestamped now
    pub fn new(name: impl Into<String>, description: impl Into<String>, entries: Vec<Entry>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            description: description.into(),
            entries,
            created_at: now,
            updated_at: now,
        }
    }

    /// Append an entry and bump `updated_at`
    pub fn add_entry(&mut self, entry: Entry) {
        self.entries.push(entry);
        self.updated_at = Utc::now();
    }

    /// Remove the first entry with `id`, bumping `updated_at` on success
    pub fn remove_entry(&mut self, id: EntryId) -> bool {
        match self.entries.iter().position(|e| e.id == id) {
            Some(index) => {
                self.entries.remove(index);
                self.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }
}

/// Metadata about a backup copy of a hosts file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupInfo {
    /// Where the backup was written
    pub path: PathBuf,
    /// The file that was backed up
    pub original_path: PathBuf,
    /// When the backup was taken
    pub created_at: DateTime<Utc>,
    /// Size of the backup in bytes
    pub size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> HostsFile {
        let mut file = HostsFile::new("/tmp/hosts");
        file.add_entry(Entry::new("127.0.0.1", ["localhost"]));
        file.add_entry(Entry::new("192.168.1.10", ["web.local", "www.local"]));
        file.add_entry(Entry::new("10.0.0.1", ["api.local", "web.local"]).disabled());
        file
    }

    #[test]
    fn test_entry_validity() {
        assert!(Entry::new("127.0.0.1", ["localhost"]).is_valid());
        assert!(!Entry::new("", ["localhost"]).is_valid());
        assert!(!Entry::new("127.0.0.1", Vec::<String>::new()).is_valid());
    }

    #[test]
    fn test_entry_validate_fields() {
        assert!(Entry::new("::1", ["ip6-localhost"]).validate().is_ok());

        let err = Entry::new("300.1.1.1", ["a"]).validate().unwrap_err();
        assert_eq!(err.field, "ip");

        let err = Entry::new("1.1.1.1", ["bad_name"]).validate().unwrap_err();
        assert_eq!(err.field, "hostnames[0]");

        let err = Entry::new("1.1.1.1", ["a"])
            .with_comment("two\nlines")
            .validate()
            .unwrap_err();
        assert_eq!(err.field, "comment");
    }

    #[test]
    fn test_entry_display() {
        let entry = Entry::new("192.168.1.1", ["server.local", "web.local"]).with_comment("Main");
        assert_eq!(entry.to_string(), "192.168.1.1\tserver.local\tweb.local\t# Main");

        let entry = Entry::new("192.168.1.2", ["disabled.local"]).disabled();
        assert_eq!(entry.to_string(), "# 192.168.1.2\tdisabled.local");
    }

    #[test]
    fn test_add_entry_on_empty_file() {
        let mut file = HostsFile::new("/tmp/hosts");
        assert_eq!(file.add_entry(Entry::new("127.0.0.1", ["localhost"])), 1);
    }

    #[test]
    fn test_add_entry_uses_max_plus_one() {
        let mut file = HostsFile::with_entries(
            "/tmp/hosts",
            vec![
                Entry {
                    id: 1,
                    ..Entry::new("1.1.1.1", ["a"])
                },
                Entry {
                    id: 5,
                    ..Entry::new("2.2.2.2", ["b"])
                },
            ],
        );
        let id = file.add_entry(Entry::new("3.3.3.3", ["c"]));
        assert_eq!(id, 6);
        assert_eq!(file.entries.last().map(|e| e.id), Some(6));
    }

    #[test]
    fn test_add_entry_at_max_id_does_not_overflow() {
        let mut file = HostsFile::with_entries(
            "/tmp/hosts",
            vec![
                Entry {
                    id: 1,
                    ..Entry::new("1.1.1.1", ["a"])
                },
                Entry {
                    id: EntryId::MAX,
                    ..Entry::new("2.2.2.2", ["b"])
                },
            ],
        );

        assert_eq!(file.add_entry(Entry::new("3.3.3.3", ["c"])), 2);
        assert_eq!(file.add_entry(Entry::new("4.4.4.4", ["d"])), 3);

        let ids: HashSet<_> = file.entries.iter().map(|e| e.id).collect();
        assert_eq!(ids.len(), file.len());
    }

    #[test]
    fn test_add_after_remove_is_max_plus_one() {
        let mut file = sample();
        assert!(file.remove_entry(1));
        assert_eq!(file.add_entry(Entry::new("4.4.4.4", ["d"])), 4);

        assert!(file.remove_entry(4));
        assert_eq!(file.add_entry(Entry::new("5.5.5.5", ["e"])), 4);
    }

    #[test]
    fn test_remove_does_not_renumber() {
        let mut file = sample();
        assert!(file.remove_entry(2));
        let ids: Vec<_> = file.entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert!(!file.remove_entry(2));
    }

    #[test]
    fn test_enable_disable() {
        let mut file = sample();
        assert!(file.disable_entry(1));
        assert!(file.find_by_id(1).is_some_and(|e| e.disabled));
        assert!(file.enable_entry(3));
        assert!(file.find_by_id(3).is_some_and(|e| !e.disabled));
        assert!(!file.enable_entry(42));
        assert!(!file.disable_entry(42));
    }

    #[test]
    fn test_find_by_name() {
        let file = sample();
        assert_eq!(file.ids_by_name("web.local"), vec![2, 3]);
        assert!(file.find_by_name("WEB.local").is_empty());
        assert!(file.find_by_name("missing").is_empty());
    }

    #[test]
    fn test_find_by_name_returns_entry_once() {
        let mut file = HostsFile::new("/tmp/hosts");
        file.add_entry(Entry::new("1.1.1.1", ["dup", "dup"]));
        assert_eq!(file.find_by_name("dup").len(), 1);
    }

    #[test]
    fn test_find_by_id_mut() {
        let mut file = sample();
        if let Some(entry) = file.find_by_id_mut(2) {
            entry.comment = "edited".to_string();
        }
        assert_eq!(file.find_by_id(2).map(|e| e.comment.as_str()), Some("edited"));
        assert_eq!(file.enabled().count(), 2);
    }

    #[test]
    fn test_profile_timestamps() {
        let mut profile = Profile::new("dev", "development", Vec::new());
        let created = profile.created_at;
        profile.add_entry(Entry {
            id: 7,
            ..Entry::new("1.1.1.1", ["a"])
        });
        assert!(profile.updated_at >= created);
        assert!(profile.remove_entry(7));
        assert!(!profile.remove_entry(7));
        assert!(profile.entries.is_empty());
    }
}
