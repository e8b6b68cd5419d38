//! Contract Test: Profile Persistence
//!
//! Verifies that profiles survive a round trip through storage and can be
//! applied back onto a hosts file.
//!
//! Constraints verified:
//! - A snapshot saved by one store instance loads in another
//! - File and memory stores behave the same through the trait
//! - Applying with replace semantics reproduces the snapshot exactly
//! - Merging appends with fresh ids
//!
//! If this test fails, saved profiles cannot be trusted.

mod common;

use common::*;
use hostsctl_core::{
    ApplyMode, Entry, Error, FileProfileStore, MemoryProfileStore, Profile, ProfileStore,
    diff_entries,
};

async fn exercise_store(store: &dyn ProfileStore) {
    let mut dev = Profile::new("dev", "local", vec![Entry::new("10.0.0.1", ["a.local"])]);
    store.save_profile(&mut dev).await.unwrap();
    store
        .save_profile(&mut Profile::new("prod", "", vec![]))
        .await
        .unwrap();

    assert!(store.exists("dev").await);
    assert!(!store.exists("staging").await);
    assert!(!store.exists("").await);

    let listed = store.list_profiles().await.unwrap();
    let names: Vec<_> = listed.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["dev", "prod"]);
    assert_eq!(listed[0].entry_count, 1);

    assert_eq!(store.load_profile("dev").await.unwrap(), dev);

    store.delete_profile("prod").await.unwrap();
    assert!(matches!(store.load_profile("prod").await, Err(Error::NotFound(_))));
    assert!(matches!(
        store.save_profile(&mut Profile::new("bad/name", "", vec![])).await,
        Err(Error::Profile(_))
    ));
}

#[tokio::test]
async fn file_store_honours_trait_contract() {
    let dir = tempfile::tempdir().unwrap();
    exercise_store(&FileProfileStore::new(dir.path())).await;
}

#[tokio::test]
async fn memory_store_honours_trait_contract() {
    exercise_store(&MemoryProfileStore::new()).await;
}

#[tokio::test]
async fn snapshot_persists_across_store_instances() {
    let fixture = HostsFixture::sample();
    let profiles_dir = fixture.dir().join("profiles");

    let mut snapshot = fixture.store().snapshot("base", "sample").await.unwrap();
    FileProfileStore::new(&profiles_dir)
        .save_profile(&mut snapshot)
        .await
        .unwrap();

    let reloaded = FileProfileStore::new(&profiles_dir)
        .load_profile("base")
        .await
        .unwrap();
    assert_eq!(reloaded.description, "sample");
    assert_eq!(reloaded.entries.len(), 4);
    assert!(
        reloaded
            .entries
            .iter()
            .zip(&snapshot.entries)
            .all(|(a, b)| a.same_content(b))
    );
}

#[tokio::test]
async fn replace_apply_reproduces_snapshot() {
    let source = HostsFixture::sample();
    let target = HostsFixture::new("10.9.9.9\tunrelated.local\n");

    let snapshot = source.store().snapshot("base", "").await.unwrap();
    target
        .store()
        .apply_profile(&snapshot, ApplyMode::Replace)
        .await
        .unwrap();

    let applied = target.store().load().await.unwrap();
    assert!(diff_entries(&applied.entries, &snapshot.entries).is_unchanged());

    let backups = target.store().list_backups().await.unwrap();
    assert_eq!(backups.len(), 1);
    assert_eq!(
        std::fs::read_to_string(&backups[0].path).unwrap(),
        "10.9.9.9\tunrelated.local\n"
    );
}

#[tokio::test]
async fn merge_apply_appends_with_fresh_ids() {
    let fixture = HostsFixture::sample();
    let profile = Profile::new(
        "extra",
        "",
        vec![
            Entry::new("10.0.0.5", ["five.local"]),
            Entry::new("10.0.0.6", ["six.local"]).disabled(),
        ],
    );

    let merged = fixture
        .store()
        .apply_profile(&profile, ApplyMode::Merge)
        .await
        .unwrap();

    let ids: Vec<_> = merged.entries.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);

    let reloaded = fixture.store().load().await.unwrap();
    assert_eq!(reloaded.ids_by_name("five.local"), vec![5]);
    assert!(reloaded.find_by_id(6).unwrap().disabled);

    let diff = diff_entries(&reloaded.entries, &profile.entries);
    assert_eq!(diff.same.len(), 2);
    assert_eq!(diff.removed.len(), 4);
}
