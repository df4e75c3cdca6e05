/// Upload storage for task attachments
///
/// Uploads are written under one root directory with generated names:
///
/// ```text
/// ./uploads/
/// ├── file-1736942400123-3f2a9c1e8b7d4e5fa0b1c2d3e4f50617.pdf
/// └── file-1736942401456-9b8a7c6d5e4f40312a1b0c9d8e7f6a5b.png
/// ```
///
/// The original filename is kept only in the database row; the stored name
/// never contains user input apart from a sanitized extension.
///
/// # Example
///
/// ```no_run
/// use tasktrack_shared::storage::{FileStore, LocalFileStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = LocalFileStore::new("./uploads")?;
/// let stored = store.put("report.pdf", b"%PDF-1.7").await?;
/// store.remove(&stored.path).await?;
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::models::task_file::NewTaskFile;

/// Longest extension carried over from the original filename
const MAX_EXTENSION_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum StorageError {
    /// Nothing stored at this path
    #[error("Stored file not found: {0}")]
    NotFound(String),

    /// Path does not belong to this store
    #[error("Path outside upload directory: {0}")]
    OutsideRoot(String),

    #[error("Failed to create upload directory {path}")]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of a successful [`FileStore::put`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Original filename as uploaded
    pub name: String,

    /// Storage location
    pub path: String,
}

impl From<StoredFile> for NewTaskFile {
    fn from(file: StoredFile) -> Self {
        NewTaskFile {
            name: file.name,
            path: file.path,
        }
    }
}

/// Place where attachment bytes live
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Stores `data` under a fresh generated name
    async fn put(&self, original_name: &str, data: &[u8]) -> Result<StoredFile, StorageError>;

    /// Removes a stored file
    ///
    /// # Errors
    ///
    /// [`StorageError::NotFound`] if the file is already gone, so callers can
    /// decide whether that matters.
    async fn remove(&self, path: &str) -> Result<(), StorageError>;
}

/// Files on the local disk under one root directory
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    /// Opens the store, creating the root directory if needed
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();

        if !root.exists() {
            std::fs::create_dir_all(&root).map_err(|source| StorageError::DirectoryCreation {
                path: root.clone(),
                source,
            })?;
        }

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn generated_name(original_name: &str) -> String {
        let extension = Path::new(original_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| {
                !ext.is_empty()
                    && ext.len() <= MAX_EXTENSION_LEN
                    && ext.chars().all(|c| c.is_ascii_alphanumeric())
            })
            .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
            .unwrap_or_default();

        format!(
            "file-{}-{}{}",
            Utc::now().timestamp_millis(),
            Uuid::new_v4().simple(),
            extension
        )
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn put(&self, original_name: &str, data: &[u8]) -> Result<StoredFile, StorageError> {
        let path = self.root.join(Self::generated_name(original_name));
        fs::write(&path, data).await?;

        debug!(path = %path.display(), bytes = data.len(), "Stored upload");

        Ok(StoredFile {
            name: original_name.to_string(),
            path: path.to_string_lossy().into_owned(),
        })
    }

    async fn remove(&self, path: &str) -> Result<(), StorageError> {
        let target = Path::new(path);
        let escapes = target
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir));
        if escapes || !target.starts_with(&self.root) {
            return Err(StorageError::OutsideRoot(path.to_string()));
        }

        match fs::remove_file(target).await {
            Ok(()) => {
                debug!(path, "Removed stored file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.to_string()))
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_generated_name_keeps_safe_extension() {
        let name = LocalFileStore::generated_name("Quarterly Report.PDF");
        assert!(name.starts_with("file-"));
        assert!(name.ends_with(".pdf"));
        // file-<millis>-<32 hex>.pdf
        assert_eq!(name.split('-').count(), 3);
    }

    #[test]
    fn test_generated_name_drops_unsafe_extension() {
        assert!(!LocalFileStore::generated_name("notes").contains('.'));
        assert!(!LocalFileStore::generated_name("evil.p/h").contains('/'));
        assert!(!LocalFileStore::generated_name("x.a b").contains(' '));
    }

    #[test]
    fn test_new_creates_root() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("nested").join("uploads");

        let store = LocalFileStore::new(&root).unwrap();
        assert!(root.is_dir());
        assert_eq!(store.root(), root.as_path());
    }

    #[tokio::test]
    async fn test_put_then_remove() {
        let dir = TempDir::new().unwrap();
        let store = LocalFileStore::new(dir.path()).unwrap();

        let stored = store.put("hello.txt", b"hello").await.unwrap();
        assert_eq!(stored.name, "hello.txt");
        assert_eq!(std::fs::read(&stored.path).unwrap(), b"hello");

        store.remove(&stored.path).await.unwrap();
        assert!(!Path::new(&stored.path).exists());
    }

    #[tokio::test]
    async fn test_remove_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = LocalFileStore::new(dir.path()).unwrap();
        let path = dir.path().join("file-0-gone.txt");

        let result = store.remove(&path.to_string_lossy()).await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_remove_outside_root_is_refused() {
        let dir = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        let store = LocalFileStore::new(dir.path()).unwrap();

        let outside = other.path().join("keep.txt");
        std::fs::write(&outside, b"keep").unwrap();

        let result = store.remove(&outside.to_string_lossy()).await;
        assert!(matches!(result, Err(StorageError::OutsideRoot(_))));
        assert!(outside.exists());

        let dotted = dir.path().join("..").join("keep.txt");
        let result = store.remove(&dotted.to_string_lossy()).await;
        assert!(matches!(result, Err(StorageError::OutsideRoot(_))));
    }

    #[test]
    fn test_stored_file_into_row_input() {
        let row: NewTaskFile = StoredFile {
            name: "a.txt".to_string(),
            path: "/tmp/uploads/file-1-x.txt".to_string(),
        }
        .into();
        assert_eq!(row.name, "a.txt");
        assert_eq!(row.path, "/tmp/uploads/file-1-x.txt");
    }
}
