//! Filesystem helpers that attach operation + path context to I/O errors.

use std::path::Path;

use crate::error::DownloadError;

/// Ensure a directory exists, creating it (recursively) if needed.
pub fn ensure_dir_all_sync(path: &Path) -> Result<(), DownloadError> {
    std::fs::create_dir_all(path).map_err(|e| DownloadError::io_path("creating directory", path, e))
}

/// `true` if `path` exists as a regular file.
pub async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Remove a file, treating "already gone" as success.
pub async fn remove_if_exists(path: &Path) -> Result<(), DownloadError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(DownloadError::io_path("removing", path, e)),
    }
}

/// Atomically move a finished file into place.
pub async fn promote(from: &Path, to: &Path) -> Result<(), DownloadError> {
    tokio::fs::rename(from, to)
        .await
        .map_err(|e| DownloadError::io_path("renaming", from, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_remove_if_exists_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.ts");
        tokio::fs::write(&path, b"data").await.unwrap();
        assert!(is_file(&path).await);
        remove_if_exists(&path).await.unwrap();
        remove_if_exists(&path).await.unwrap();
        assert!(!is_file(&path).await);
    }

    #[test]
    fn test_ensure_dir_all_creates_nested() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        ensure_dir_all_sync(&nested).unwrap();
        assert!(nested.is_dir());
    }
}
