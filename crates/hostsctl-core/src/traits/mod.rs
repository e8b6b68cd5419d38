//! Core traits for hostsctl
//!
//! - [`ProfileStore`]: Persistent storage for named entry snapshots

pub mod profile_store;

pub use profile_store::{ProfileMetadata, ProfileStore};
