//! Filesystem storage for rendered documents and merged batch artifacts.
//!
//! Stored paths are relative, opaque strings recorded on job and document rows.
//! Writes go through a temporary file in the target directory and are renamed into
//! place, so a reader never observes a half-written PDF and rewriting the same path
//! is idempotent.

use std::io::Write as _;
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use thiserror::Error;
use tokio::fs;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid stored path `{0}`")]
    InvalidPath(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("storage task aborted: {0}")]
    Join(String),
}

/// Path of a single rendered document, keyed by its sequence number.
pub fn document_path(sequence_number: i64) -> String {
    format!("documents/{sequence_number:08}.pdf")
}

/// Path of a merged batch artifact, keyed by the batch hash.
pub fn batch_path(hash: &str) -> String {
    format!("batches/{hash}.pdf")
}

/// Path of the merged copy of an email dispatch, keyed by the batch hash.
pub fn dispatch_path(hash: &str) -> String {
    format!("dispatches/{hash}.pdf")
}

#[derive(Debug)]
pub struct DocumentStorage {
    root: PathBuf,
}

impl DocumentStorage {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Write `data` at `stored_path`, replacing any previous object atomically.
    pub async fn put(&self, stored_path: &str, data: Bytes) -> Result<(), StorageError> {
        let absolute = self.resolve(stored_path)?;
        let parent = absolute
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| StorageError::InvalidPath(stored_path.to_string()))?;
        fs::create_dir_all(&parent).await?;

        tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
            let mut file = tempfile::NamedTempFile::new_in(&parent)?;
            file.write_all(&data)?;
            file.as_file().sync_all()?;
            file.persist(&absolute).map_err(|err| StorageError::Io(err.error))?;
            Ok(())
        })
        .await
        .map_err(|err| StorageError::Join(err.to_string()))?
    }

    /// Read a stored object. A missing object is `Ok(None)`.
    pub async fn get(&self, stored_path: &str) -> Result<Option<Bytes>, StorageError> {
        let absolute = self.resolve(stored_path)?;
        match fs::read(absolute).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    fn resolve(&self, stored_path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(stored_path);
        if stored_path.is_empty()
            || relative.is_absolute()
            || relative
                .components()
                .any(|component| matches!(component, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(StorageError::InvalidPath(stored_path.to_string()));
        }

        Ok(self.root.join(relative))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips_and_overwrites() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = DocumentStorage::new(dir.path().to_path_buf()).expect("storage");
        let path = document_path(7);
        assert_eq!(path, "documents/00000007.pdf");

        storage
            .put(&path, Bytes::from_static(b"first"))
            .await
            .expect("first write");
        storage
            .put(&path, Bytes::from_static(b"second"))
            .await
            .expect("second write");

        let data = storage.get(&path).await.expect("read").expect("present");
        assert_eq!(&data[..], b"second");
    }

    #[tokio::test]
    async fn missing_objects_read_as_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = DocumentStorage::new(dir.path().to_path_buf()).expect("storage");

        assert!(storage.get("batches/nope.pdf").await.expect("read").is_none());
    }

    #[tokio::test]
    async fn escaping_paths_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = DocumentStorage::new(dir.path().to_path_buf()).expect("storage");

        for path in ["../outside.pdf", "/etc/passwd", ""] {
            let err = storage.get(path).await.expect_err("rejected");
            assert!(matches!(err, StorageError::InvalidPath(_)));
        }
    }
}
