//! Crash-safe file replacement
//!
//! New contents go to `<path>.tmp`, are flushed to stable storage, and the
//! temp file is renamed over `path`. The rename is the only step that touches
//! `path`, so a failure at any point leaves the original bytes in place and
//! concurrent readers see either the old or the new file, never a mix.

use std::fs::Permissions;
use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{trace, warn};

use crate::error::{Error, IoOperation, Result};

/// Sibling temp file used while replacing `path`
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut temp = path.as_os_str().to_os_string();
    temp.push(".tmp");
    PathBuf::from(temp)
}

/// Atomically replace `path` with `contents`
///
/// When `permissions` is given they are applied to the temp file before the
/// rename, so the replacement keeps the original file's mode.
pub async fn write_atomic(
    path: &Path,
    contents: &[u8],
    permissions: Option<Permissions>,
) -> Result<()> {
    let temp_path = temp_path_for(path);

    if let Err(e) = write_temp(&temp_path, contents, permissions).await {
        remove_temp(&temp_path).await;
        return Err(e);
    }

    if let Err(source) = fs::rename(&temp_path, path).await {
        remove_temp(&temp_path).await;
        return Err(Error::io(IoOperation::Rename, path, source));
    }

    sync_parent_dir(path).await;
    trace!(file = %path.display(), bytes = contents.len(), "file replaced atomically");
    Ok(())
}

async fn write_temp(
    temp_path: &Path,
    contents: &[u8],
    permissions: Option<Permissions>,
) -> Result<()> {
    let write_err = |source| Error::io(IoOperation::WriteTemp, temp_path, source);

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(temp_path)
        .await
        .map_err(write_err)?;

    file.write_all(contents).await.map_err(write_err)?;
    file.flush().await.map_err(write_err)?;

    if let Some(permissions) = permissions {
        file.set_permissions(permissions).await.map_err(write_err)?;
    }

    file.sync_all()
        .await
        .map_err(|source| Error::io(IoOperation::Sync, temp_path, source))?;
    Ok(())
}

async fn remove_temp(temp_path: &Path) {
    match fs::remove_file(temp_path).await {
        Err(error) if error.kind() != io::ErrorKind::NotFound => {
            warn!(file = %temp_path.display(), error = %error, "failed to remove temp file");
        }
        _ => {}
    }
}

/// Persist the rename itself; failure only weakens durability, not atomicity
async fn sync_parent_dir(path: &Path) {
    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return;
    };
    let result = match fs::File::open(parent).await {
        Ok(dir) => dir.sync_all().await,
        Err(e) => Err(e),
    };
    if let Err(error) = result {
        trace!(dir = %parent.display(), error = %error, "directory sync skipped");
    }
}
