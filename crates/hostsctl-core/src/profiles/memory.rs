// # Memory Profile Store
//
// In-memory implementation of ProfileStore.
//
// Profiles are lost when the store is dropped. Useful for tests and for
// embedding the core where profile persistence is handled elsewhere.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::Error;
use crate::model::Profile;
use crate::profiles::validate_profile_name;
use crate::traits::profile_store::{ProfileMetadata, ProfileStore};

/// In-memory profile store
///
/// Profiles live in a name-ordered map behind a `RwLock`.
///
/// # Example
///
/// ```rust,no_run
/// use hostsctl_core::{MemoryProfileStore, Profile, ProfileStore};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryProfileStore::new();
///
///     store.save_profile(&mut Profile::new("dev", "", vec![])).await?;
///     assert!(store.exists("dev").await);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryProfileStore {
    inner: Arc<RwLock<BTreeMap<String, Profile>>>,
}

impl MemoryProfileStore {
    /// Create a new empty memory profile store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored profiles
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Whether the store holds no profiles
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn save_profile(&self, profile: &mut Profile) -> Result<(), Error> {
        validate_profile_name(&profile.name)?;

        let mut guard = self.inner.write().await;
        if let Some(existing) = guard.get(&profile.name) {
            profile.created_at = existing.created_at;
        }
        profile.updated_at = Utc::now();
        guard.insert(profile.name.clone(), profile.clone());
        Ok(())
    }

    async fn load_profile(&self, name: &str) -> Result<Profile, Error> {
        validate_profile_name(name)?;
        let guard = self.inner.read().await;
        guard
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("profile '{name}' not found")))
    }

    async fn delete_profile(&self, name: &str) -> Result<(), Error> {
        validate_profile_name(name)?;
        let mut guard = self.inner.write().await;
        match guard.remove(name) {
            Some(_) => Ok(()),
            None => Err(Error::not_found(format!("profile '{name}' not found"))),
        }
    }

    async fn list_profiles(&self) -> Result<Vec<ProfileMetadata>, Error> {
        let guard = self.inner.read().await;
        let profiles = guard
            .values()
            .map(|profile| {
                let size = serde_json::to_vec(profile).map_or(0, |bytes| bytes.len() as u64);
                ProfileMetadata::from_profile(profile, None, size)
            })
            .collect();
        Ok(profiles)
    }

    async fn exists(&self, name: &str) -> bool {
        if validate_profile_name(name).is_err() {
            return false;
        }
        self.inner.read().await.contains_key(name)
    }
}
