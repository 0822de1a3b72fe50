use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::types::PhotoPhase;

/// Public URL prefix under which stored photos are served back.
pub const PUBLIC_PREFIX: &str = "/uploads/";

#[derive(Debug, Error)]
pub enum PhotoStorageError {
    #[error("photo not found")]
    NotFound,
    #[error("invalid photo path")]
    InvalidPath,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Flat on-disk store for uploaded photo evidence. Files live under
/// `<data_dir>/uploads` and are referenced from records by their public path
/// (`/uploads/<name>`). Deletions are best-effort by design: the database row
/// is authoritative and a leftover file is preferable to a failed delete.
#[derive(Clone)]
pub struct PhotoStore {
    base_path: PathBuf,
}

impl PhotoStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            base_path: data_dir.join("uploads"),
        }
    }

    fn file_path(&self, public_path: &str) -> Result<PathBuf, PhotoStorageError> {
        let name = public_path
            .strip_prefix(PUBLIC_PREFIX)
            .ok_or(PhotoStorageError::InvalidPath)?;
        validate_name(name)?;
        Ok(self.base_path.join(name))
    }

    /// Writes one uploaded file and returns its public path. The stored name
    /// is generated server-side; only the original extension survives.
    pub async fn save(
        &self,
        phase: PhotoPhase,
        original_name: &str,
        data: &[u8],
    ) -> Result<String, PhotoStorageError> {
        let prefix = match phase {
            PhotoPhase::Before => "before",
            PhotoPhase::After => "after",
        };
        let ext = sanitized_extension(original_name);
        let name = format!("{prefix}-{}{ext}", Uuid::new_v4());

        fs::create_dir_all(&self.base_path).await?;

        let path = self.base_path.join(&name);
        let mut file = File::create(&path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;

        Ok(format!("{PUBLIC_PREFIX}{name}"))
    }

    /// Reads a stored photo back for serving.
    pub async fn read(&self, public_path: &str) -> Result<Vec<u8>, PhotoStorageError> {
        let path = self.file_path(public_path)?;
        fs::read(&path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                PhotoStorageError::NotFound
            } else {
                PhotoStorageError::Io(e)
            }
        })
    }

    /// Removes a stored photo. Returns false when the file was already gone.
    pub async fn delete(&self, public_path: &str) -> Result<bool, PhotoStorageError> {
        let path = self.file_path(public_path)?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(PhotoStorageError::Io(e)),
        }
    }

    /// Deletes every path in `paths`, logging failures instead of aborting.
    pub async fn delete_all_best_effort(&self, paths: &[String]) {
        for path in paths {
            if let Err(e) = self.delete(path).await {
                tracing::warn!("Failed to delete photo file {path}: {e}");
            }
        }
    }
}

fn validate_name(name: &str) -> Result<(), PhotoStorageError> {
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(PhotoStorageError::InvalidPath);
    }
    Ok(())
}

fn sanitized_extension(original_name: &str) -> String {
    match original_name.rsplit_once('.') {
        Some((_, ext))
            if !ext.is_empty()
                && ext.len() <= 8
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            format!(".{}", ext.to_ascii_lowercase())
        }
        _ => String::new(),
    }
}

/// Best-effort content type from the stored file name, for serving.
#[must_use]
pub fn content_type_for(public_path: &str) -> &'static str {
    let lower = public_path.to_ascii_lowercase();
    if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".webp") {
        "image/webp"
    } else if lower.ends_with(".gif") {
        "image/gif"
    } else {
        "application/octet-stream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_and_read() {
        let temp_dir = TempDir::new().unwrap();
        let store = PhotoStore::new(temp_dir.path());

        let path = store
            .save(PhotoPhase::Before, "evidence.JPG", b"fake image data")
            .await
            .unwrap();

        assert!(path.starts_with("/uploads/before-"));
        assert!(path.ends_with(".jpg"));
        assert_eq!(store.read(&path).await.unwrap(), b"fake image data");
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let store = PhotoStore::new(temp_dir.path());

        let path = store
            .save(PhotoPhase::After, "done.png", b"after")
            .await
            .unwrap();

        assert!(store.delete(&path).await.unwrap());
        assert!(!store.delete(&path).await.unwrap());
        assert!(matches!(
            store.read(&path).await,
            Err(PhotoStorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_rejects_traversal() {
        let temp_dir = TempDir::new().unwrap();
        let store = PhotoStore::new(temp_dir.path());

        assert!(matches!(
            store.read("/uploads/../secret").await,
            Err(PhotoStorageError::InvalidPath)
        ));
        assert!(matches!(
            store.read("/etc/passwd").await,
            Err(PhotoStorageError::InvalidPath)
        ));
    }

    #[test]
    fn test_extension_sanitizing() {
        assert_eq!(sanitized_extension("a.jpeg"), ".jpeg");
        assert_eq!(sanitized_extension("noext"), "");
        assert_eq!(sanitized_extension("weird.j/pg"), "");
        assert_eq!(sanitized_extension("dot."), "");
    }

    #[test]
    fn test_content_type() {
        assert_eq!(content_type_for("/uploads/x.jpg"), "image/jpeg");
        assert_eq!(content_type_for("/uploads/x.png"), "image/png");
        assert_eq!(content_type_for("/uploads/x.bin"), "application/octet-stream");
    }
}
