// # hostsctl-core
//
// Core library for managing hosts files safely.
//
// ## Architecture Overview
//
// - **validation**: Syntax checks for IP addresses, hostnames and comments
// - **parser**: Line-oriented hosts text ⇄ `HostsFile`, strict or lenient
// - **model**: `Entry`, `HostsFile`, `Profile` and `BackupInfo`
// - **lock**: Cross-process advisory lock on `<path>.lock`
// - **store**: Load, save (backup + atomic rename), backup, restore, verify
// - **profiles**: `ProfileStore` implementations and profile diffs
// - **search**: Substring or regex queries over entries
//
// ## Write Path
//
// Every mutation follows the same control flow:
//
// ```text
// with_lock(path) {
//     load → mutate in memory → save(backup → temp → fsync → rename)
// }
// ```
//
// Readers never take the lock; the rename guarantees they see a complete
// file.

pub mod config;
pub mod error;
pub mod lock;
pub mod model;
pub mod parser;
pub mod profiles;
pub mod search;
pub mod store;
pub mod traits;
pub mod validation;

// Re-export core types for convenience
pub use config::HostsConfig;
pub use error::{Error, IoOperation, LockError, ParseError, Result, ValidationError};
pub use lock::{FileLock, with_lock};
pub use model::{BackupInfo, Entry, EntryId, HostsFile, Profile};
pub use parser::{ParseMode, Parser};
pub use profiles::{FileProfileStore, MemoryProfileStore, ProfileDiff, diff_entries};
pub use search::{MatchType, SearchOptions, SearchResult};
pub use store::{ApplyMode, HostsStore};
pub use traits::{ProfileMetadata, ProfileStore};
