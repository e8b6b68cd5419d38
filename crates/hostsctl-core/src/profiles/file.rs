// # File Profile Store
//
// File-based implementation of ProfileStore.
//
// ## Layout
//
// One pretty-printed JSON document per profile:
//
// ```text
// <profiles_dir>/
//   dev.json
//   staging.json
// ```
//
// ## Durability
//
// Profiles are written with the same temp-file + fsync + rename primitive as
// the hosts file, so a crash mid-save leaves either the old or the new
// profile. Files are created 0600 and the directory 0750.
//
// ## File Format
//
// ```json
// {
//   "name": "dev",
//   "description": "local services",
//   "entries": [
//     { "id": 1, "ip": "10.0.0.5", "names": ["api.local"], "comment": "", "disabled": false }
//   ],
//   "created_at": "2025-01-09T12:00:00Z",
//   "updated_at": "2025-01-09T12:00:00Z"
// }
// ```

use std::fs::Permissions;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::Error;
use crate::error::IoOperation;
use crate::model::Profile;
use crate::profiles::validate_profile_name;
use crate::store::write_atomic;
use crate::traits::profile_store::{ProfileMetadata, ProfileStore};

/// Extension of stored profile documents
const PROFILE_EXTENSION: &str = "json";

/// File-based profile store
///
/// # Example
///
/// ```rust,no_run
/// use hostsctl_core::{FileProfileStore, ProfileStore};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileProfileStore::new("/home/me/.config/hostsctl/profiles");
///
///     for meta in store.list_profiles().await? {
///         println!("{} ({} entries)", meta.name, meta.entry_count);
///     }
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileProfileStore {
    dir: PathBuf,
}

impl FileProfileStore {
    /// Create a store rooted at `dir`
    ///
    /// The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the profile documents
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File a profile named `name` is stored in
    pub fn profile_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{PROFILE_EXTENSION}"))
    }

    async fn ensure_dir(&self) -> Result<(), Error> {
        fs::DirBuilder::new()
            .recursive(true)
            .mode(0o750)
            .create(&self.dir)
            .await
            .map_err(|source| Error::io(IoOperation::CreateDir, &self.dir, source))
    }

    async fn read_profile(path: &Path) -> Result<(Profile, u64), Error> {
        let content = fs::read(path)
            .await
            .map_err(|source| Error::io(IoOperation::Read, path, source))?;

        let profile: Profile = serde_json::from_slice(&content).map_err(|e| {
            Error::profile(format!(
                "failed to parse profile file {}: {e}",
                path.display()
            ))
        })?;

        Ok((profile, content.len() as u64))
    }
}

#[async_trait]
impl ProfileStore for FileProfileStore {
    async fn save_profile(&self, profile: &mut Profile) -> Result<(), Error> {
        validate_profile_name(&profile.name)?;
        self.ensure_dir().await?;

        let path = self.profile_path(&profile.name);
        if let Ok((existing, _)) = Self::read_profile(&path).await {
            profile.created_at = existing.created_at;
        }
        profile.updated_at = Utc::now();

        let json = serde_json::to_vec_pretty(profile)?;
        write_atomic(&path, &json, Some(Permissions::from_mode(0o600))).await?;

        info!(profile = %profile.name, entries = profile.entries.len(), "profile saved");
        Ok(())
    }

    async fn load_profile(&self, name: &str) -> Result<Profile, Error> {
        validate_profile_name(name)?;
        let path = self.profile_path(name);

        match Self::read_profile(&path).await {
            Ok((profile, _)) => Ok(profile),
            Err(Error::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                Err(Error::not_found(format!("profile '{name}' not found")))
            }
            Err(e) => Err(e),
        }
    }

    async fn delete_profile(&self, name: &str) -> Result<(), Error> {
        validate_profile_name(name)?;
        let path = self.profile_path(name);

        match fs::remove_file(&path).await {
            Ok(()) => {
                info!(profile = %name, "profile deleted");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(Error::not_found(format!("profile '{name}' not found")))
            }
            Err(source) => Err(Error::io(IoOperation::Remove, path, source)),
        }
    }

    async fn list_profiles(&self) -> Result<Vec<ProfileMetadata>, Error> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(Error::io(IoOperation::List, &self.dir, source)),
        };

        let mut profiles = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| Error::io(IoOperation::List, &self.dir, source))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(PROFILE_EXTENSION) {
                continue;
            }
            match Self::read_profile(&path).await {
                Ok((profile, size)) => {
                    profiles.push(ProfileMetadata::from_profile(&profile, Some(path), size));
                }
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "skipping unreadable profile");
                }
            }
        }

        profiles.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(dir = %self.dir.display(), count = profiles.len(), "profiles listed");
        Ok(profiles)
    }

    async fn exists(&self, name: &str) -> bool {
        if validate_profile_name(name).is_err() {
            return false;
        }
        fs::try_exists(self.profile_path(name)).await.unwrap_or(false)
    }
}
