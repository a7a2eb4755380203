//! Async filesystem helpers that map failures to [`StoreError::Io`].

use std::path::{Path, PathBuf};

use crate::error::{Result, StoreError};

/// Read a whole file.
pub async fn read_file(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|err| StoreError::io(path, err))
}

/// Write `bytes` to `path`, creating parent directories.
pub async fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes)
        .await
        .map_err(|err| StoreError::io(path, err))
}

/// Recursively copy `src` into `dst`, overwriting files that exist in both.
///
/// Entries present only in `dst` are kept. Symlinks are followed: a link to
/// a directory is copied as a directory, a link to a file as a file.
pub async fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    let mut pending: Vec<(PathBuf, PathBuf)> = vec![(src.to_path_buf(), dst.to_path_buf())];

    while let Some((from, to)) = pending.pop() {
        create_dir_all(&to).await?;
        let mut entries = tokio::fs::read_dir(&from)
            .await
            .map_err(|err| StoreError::io(&from, err))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| StoreError::io(&from, err))?
        {
            let source = entry.path();
            let target = to.join(entry.file_name());
            let mut is_dir = entry
                .file_type()
                .await
                .map_err(|err| StoreError::io(&source, err))?
                .is_dir();
            if !is_dir {
                // Resolves symlinks; plain files are unaffected.
                is_dir = tokio::fs::metadata(&source)
                    .await
                    .map_err(|err| StoreError::io(&source, err))?
                    .is_dir();
            }

            if is_dir {
                pending.push((source, target));
            } else {
                tokio::fs::copy(&source, &target)
                    .await
                    .map_err(|err| StoreError::io(&target, err))?;
            }
        }
    }
    Ok(())
}

/// Make `dst` an exact copy of the directory `src`.
pub async fn replace_dir(src: &Path, dst: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(dst).await {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(StoreError::io(dst, err)),
    }
    copy_dir(src, dst).await
}

async fn create_dir_all(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|err| StoreError::io(path, err))
}
