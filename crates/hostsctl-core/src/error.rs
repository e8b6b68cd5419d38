//! Error types for hostsctl
//!
//! This module defines all error types used throughout the crate.
//!
//! The structured errors ([`ParseError`], [`ValidationError`], [`LockError`])
//! can be matched on directly and all convert into the crate-level [`Error`].

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for hostsctl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for hostsctl
#[derive(Error, Debug)]
pub enum Error {
    /// Hosts document could not be parsed (strict mode only)
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A field failed validation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Lock acquisition or release failed
    #[error(transparent)]
    Lock(#[from] LockError),

    /// Filesystem error, tagged with the step that failed
    #[error("{operation} failed for {}: {source}", path.display())]
    Io {
        /// Which step of the operation failed
        operation: IoOperation,
        /// Path being operated on
        path: PathBuf,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },

    /// Caller lacks the privileges required for the operation
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Entry, profile or file not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Profile storage errors
    #[error("Profile error: {0}")]
    Profile(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Search pattern is not a valid regular expression
    #[error("Invalid search pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl Error {
    /// Wrap an I/O error with the failing step and path
    pub fn io(operation: IoOperation, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Create a permission error
    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a profile error
    pub fn profile(msg: impl Into<String>) -> Self {
        Self::Profile(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// The I/O step that failed, if this is an I/O error
    pub fn io_operation(&self) -> Option<IoOperation> {
        match self {
            Self::Io { operation, .. } => Some(*operation),
            _ => None,
        }
    }
}

/// Filesystem step an [`Error::Io`] originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOperation {
    /// Opening a file for reading
    Open,
    /// Reading file contents
    Read,
    /// Copying the current file to a backup
    Backup,
    /// Writing the temporary sibling file
    WriteTemp,
    /// Flushing data durably to storage
    Sync,
    /// Atomically replacing the target with the temp file
    Rename,
    /// Deleting a file
    Remove,
    /// Listing a directory
    List,
    /// Creating a directory
    CreateDir,
}

impl fmt::Display for IoOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Open => "open",
            Self::Read => "read",
            Self::Backup => "backup",
            Self::WriteTemp => "write-temp",
            Self::Sync => "sync",
            Self::Rename => "rename",
            Self::Remove => "remove",
            Self::List => "list",
            Self::CreateDir => "create-dir",
        };
        f.write_str(name)
    }
}

/// A line of a hosts document that could not be turned into an entry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("parse error at line {line}: {reason} (content: {content:?})")]
pub struct ParseError {
    /// 1-based line number
    pub line: usize,
    /// Raw content of the offending line
    pub content: String,
    /// Human-readable description of the problem
    pub reason: String,
}

impl ParseError {
    pub(crate) fn new(line: usize, content: &str, reason: impl Into<String>) -> Self {
        Self {
            line,
            content: content.to_string(),
            reason: reason.into(),
        }
    }
}

/// A field value rejected by a validator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {message} ({value:?})")]
pub struct ValidationError {
    /// Name of the field that failed validation
    pub field: String,
    /// The rejected value
    pub value: String,
    /// Human-readable error message
    pub message: String,
}

impl ValidationError {
    pub(crate) fn new(field: &str, value: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            value: value.to_string(),
            message: message.into(),
        }
    }
}

/// Advisory lock errors
#[derive(Error, Debug)]
pub enum LockError {
    /// Another holder currently owns the lock
    #[error("lock on {} is already held by another process", path.display())]
    Contended {
        /// Path of the `.lock` file
        path: PathBuf,
    },

    /// The lock could not be acquired before the deadline
    #[error("timed out after {waited:?} waiting for lock on {}", path.display())]
    Timeout {
        /// Path of the `.lock` file
        path: PathBuf,
        /// How long acquisition was attempted
        waited: Duration,
    },

    /// This instance already holds the lock (locks are not re-entrant)
    #[error("lock on {} is already held by this instance", path.display())]
    AlreadyAcquired {
        /// Path of the `.lock` file
        path: PathBuf,
    },

    /// `unlock` was called on a lock that is not held
    #[error("lock on {} is not held", path.display())]
    NotHeld {
        /// Path of the `.lock` file
        path: PathBuf,
    },

    /// The operating system refused a lock operation
    #[error("lock operation failed on {}: {source}", path.display())]
    Os {
        /// Path of the `.lock` file
        path: PathBuf,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },
}

impl LockError {
    /// Whether this error means the lock is held elsewhere (contention or timeout)
    pub fn is_contention(&self) -> bool {
        matches!(self, Self::Contended { .. } | Self::Timeout { .. })
    }
}
