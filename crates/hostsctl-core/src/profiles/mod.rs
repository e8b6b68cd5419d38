// # Profile Store Implementations
//
// This module provides implementations of the ProfileStore trait, the
// profile name rules they share, and the entry diff used to compare a
// profile with a live hosts file.

pub mod file;
pub mod memory;

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::model::Entry;

pub use file::FileProfileStore;
pub use memory::MemoryProfileStore;

/// Maximum profile name length in characters
pub const MAX_PROFILE_NAME_LEN: usize = 100;

const INVALID_NAME_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|', '\n', '\r', '\t'];

const RESERVED_NAMES: &[&str] = &[
    "con", "prn", "aux", "nul", "com1", "com2", "com3", "com4", "com5", "com6", "com7", "com8",
    "com9", "lpt1", "lpt2", "lpt3", "lpt4", "lpt5", "lpt6", "lpt7", "lpt8", "lpt9",
];

/// Check that `name` is usable as a profile file name
pub fn validate_profile_name(name: &str) -> Result<(), Error> {
    if name.is_empty() {
        return Err(Error::profile("profile name cannot be empty"));
    }
    if name.chars().count() > MAX_PROFILE_NAME_LEN {
        return Err(Error::profile(format!(
            "profile name too long (max {MAX_PROFILE_NAME_LEN} characters)"
        )));
    }
    if let Some(c) = name.chars().find(|c| INVALID_NAME_CHARS.contains(c)) {
        return Err(Error::profile(format!(
            "profile name contains invalid character: {c:?}"
        )));
    }
    if name.starts_with('.') {
        return Err(Error::profile("profile name cannot start with dot"));
    }
    if RESERVED_NAMES.contains(&name.to_ascii_lowercase().as_str()) {
        return Err(Error::profile(format!("profile name is reserved: {name}")));
    }
    Ok(())
}

/// An entry present on both sides with different comment or state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifiedEntry {
    /// Entry as it is in the hosts file
    pub old: Entry,
    /// Entry as it is in the profile
    pub new: Entry,
}

/// Result of comparing live entries with a profile
///
/// Entries are matched on IP plus their ordered hostnames.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDiff {
    /// In the profile but not in the hosts file
    pub added: Vec<Entry>,
    /// In the hosts file but not in the profile
    pub removed: Vec<Entry>,
    /// On both sides with a different comment or disabled flag
    pub modified: Vec<ModifiedEntry>,
    /// Identical on both sides
    pub same: Vec<Entry>,
}

impl ProfileDiff {
    /// Whether applying the profile with replace semantics would change nothing
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }
}

fn entry_key(entry: &Entry) -> String {
    format!("{}:{}", entry.ip, entry.names.join(","))
}

/// Compare `current` (the hosts file) against `profile` entries
///
/// Results keep the order of their source list. When a key occurs more than
/// once on one side only the first occurrence takes part.
pub fn diff_entries(current: &[Entry], profile: &[Entry]) -> ProfileDiff {
    let mut current_by_key: HashMap<String, &Entry> = HashMap::new();
    for entry in current {
        current_by_key.entry(entry_key(entry)).or_insert(entry);
    }

    let mut diff = ProfileDiff::default();
    let mut profile_keys: HashSet<String> = HashSet::new();

    for entry in profile {
        let key = entry_key(entry);
        if !profile_keys.insert(key.clone()) {
            continue;
        }
        match current_by_key.get(&key) {
            Some(existing) if existing.same_content(entry) => diff.same.push(entry.clone()),
            Some(existing) => diff.modified.push(ModifiedEntry {
                old: (*existing).clone(),
                new: entry.clone(),
            }),
            None => diff.added.push(entry.clone()),
        }
    }

    let mut seen: HashSet<String> = HashSet::new();
    for entry in current {
        let key = entry_key(entry);
        if !seen.insert(key.clone()) {
            continue;
        }
        if !profile_keys.contains(&key) {
            diff.removed.push(entry.clone());
        }
    }

    diff
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_profile_names() {
        for name in ["dev", "staging-2", "my profile", "a.b", "console"] {
            assert!(validate_profile_name(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn test_invalid_profile_names() {
        let too_long = "x".repeat(MAX_PROFILE_NAME_LEN + 1);
        for name in [
            "",
            too_long.as_str(),
            "a/b",
            "a\\b",
            "a:b",
            "what?",
            "tab\there",
            ".hidden",
            "CON",
            "lpt9",
        ] {
            let err = validate_profile_name(name).unwrap_err();
            assert!(matches!(err, Error::Profile(_)), "{name:?} should be rejected");
        }
        assert!(validate_profile_name(&"x".repeat(MAX_PROFILE_NAME_LEN)).is_ok());
    }

    #[test]
    fn test_diff_classifies_entries() {
        let current = vec![
            Entry::new("127.0.0.1", ["localhost"]),
            Entry::new("10.0.0.1", ["api.local"]).with_comment("old"),
            Entry::new("10.0.0.2", ["gone.local"]),
        ];
        let profile = vec![
            Entry::new("127.0.0.1", ["localhost"]),
            Entry::new("10.0.0.1", ["api.local"]).with_comment("new"),
            Entry::new("10.0.0.3", ["fresh.local"]).disabled(),
        ];

        let diff = diff_entries(&current, &profile);

        assert_eq!(diff.same.len(), 1);
        assert_eq!(diff.added[0].names, vec!["fresh.local"]);
        assert_eq!(diff.removed[0].names, vec!["gone.local"]);
        assert_eq!(diff.modified.len(), 1);
        assert_eq!(diff.modified[0].old.comment, "old");
        assert_eq!(diff.modified[0].new.comment, "new");
        assert!(!diff.is_unchanged());
    }

    #[test]
    fn test_diff_ignores_ids_and_disabled_counts_as_modified() {
        let mut live = Entry::new("10.0.0.1", ["a", "b"]);
        live.id = 7;
        let snapshot = Entry::new("10.0.0.1", ["a", "b"]);

        assert!(diff_entries(&[live.clone()], &[snapshot.clone()]).is_unchanged());

        let diff = diff_entries(&[live], &[snapshot.disabled()]);
        assert_eq!(diff.modified.len(), 1);
    }

    #[test]
    fn test_diff_name_order_matters() {
        let diff = diff_entries(
            &[Entry::new("10.0.0.1", ["a", "b"])],
            &[Entry::new("10.0.0.1", ["b", "a"])],
        );
        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.removed.len(), 1);
    }
}
