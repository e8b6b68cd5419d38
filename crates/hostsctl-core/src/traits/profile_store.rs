// # Profile Store Trait
//
// Defines the interface for persistent profile storage.
//
// ## Purpose
//
// A profile is a named snapshot of hosts entries that can later be applied
// to a hosts file or compared against it. The store only persists and
// retrieves profiles; applying them is `HostsStore::apply_profile`.
//
// ## Implementations
//
// - `FileProfileStore`: one JSON document per profile
// - `MemoryProfileStore`: non-persistent, for tests and embedding
//
// ## Usage
//
// ```rust
// use hostsctl_core::{ProfileStore, Profile};
//
// #[tokio::main]
// async fn main() -> hostsctl_core::Result<()> {
//     let store = /* ProfileStore implementation */;
//
//     store.save_profile(&mut Profile::new("dev", "local services", vec![])).await?;
//     let dev = store.load_profile("dev").await?;
//
//     Ok(())
// }
// ```

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Profile;

/// Summary of a stored profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileMetadata {
    /// Profile name
    pub name: String,
    /// Free-form description
    pub description: String,
    /// Backing file, if the store is file-based
    pub file_path: Option<PathBuf>,
    /// When the profile was first saved
    pub created_at: DateTime<Utc>,
    /// When the profile was last saved
    pub updated_at: DateTime<Utc>,
    /// Number of entries in the profile
    pub entry_count: usize,
    /// Size of the stored representation in bytes
    pub size_bytes: u64,
}

impl ProfileMetadata {
    /// Metadata for an in-memory profile
    pub(crate) fn from_profile(profile: &Profile, file_path: Option<PathBuf>, size_bytes: u64) -> Self {
        Self {
            name: profile.name.clone(),
            description: profile.description.clone(),
            file_path,
            created_at: profile.created_at,
            updated_at: profile.updated_at,
            entry_count: profile.entries.len(),
            size_bytes,
        }
    }
}

/// Trait for profile store implementations
///
/// All methods validate the profile name first (see
/// [`crate::profiles::validate_profile_name`]) and fail with
/// [`crate::Error::Profile`] on an invalid one.
///
/// # Thread Safety
///
/// Implementations must be safe to share across tasks.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Persist `profile`, replacing any profile with the same name
    ///
    /// Bumps `updated_at` to now. `created_at` is kept when a profile of
    /// that name already exists.
    async fn save_profile(&self, profile: &mut Profile) -> Result<(), crate::Error>;

    /// Load a profile by name
    ///
    /// # Returns
    ///
    /// - `Ok(Profile)`: The stored profile
    /// - `Err(Error::NotFound)`: No profile with that name
    /// - `Err(Error)`: Storage error
    async fn load_profile(&self, name: &str) -> Result<Profile, crate::Error>;

    /// Delete a profile by name
    ///
    /// Fails with `Error::NotFound` if it does not exist.
    async fn delete_profile(&self, name: &str) -> Result<(), crate::Error>;

    /// Metadata for every stored profile, sorted by name
    ///
    /// Unreadable entries are skipped.
    async fn list_profiles(&self) -> Result<Vec<ProfileMetadata>, crate::Error>;

    /// Whether a profile with `name` exists
    ///
    /// Invalid names never exist.
    async fn exists(&self, name: &str) -> bool;
}
