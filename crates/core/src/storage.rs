use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::session::UserId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentKind {
    Identity,
    Vehicle,
}

impl DocumentKind {
    fn file_stem(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Vehicle => "vehicle",
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("could not create storage root `{path}`: {source}")]
    CreateRoot { path: PathBuf, source: std::io::Error },
    #[error("could not write `{path}`: {source}")]
    Write { path: PathBuf, source: std::io::Error },
    #[error("could not scan storage root `{path}`: {source}")]
    Scan { path: PathBuf, source: std::io::Error },
}

/// File storage seam for received photos and generated policy artifacts.
/// Keys are per user and per document kind, so a resubmission overwrites the
/// previous file in place instead of accumulating copies.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn save_attachment(
        &self,
        user: UserId,
        kind: DocumentKind,
        bytes: &[u8],
    ) -> Result<PathBuf, StorageError>;

    async fn save_artifact(
        &self,
        user: UserId,
        filename: &str,
        content: &str,
    ) -> Result<PathBuf, StorageError>;

    /// Removes stored files older than `ttl`. Returns the number removed.
    async fn purge_older_than(&self, ttl: Duration) -> Result<usize, StorageError>;
}

pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .map_err(|source| StorageError::CreateRoot { path: root.clone(), source })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn write(&self, path: PathBuf, bytes: &[u8]) -> Result<PathBuf, StorageError> {
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| StorageError::Write { path: path.clone(), source })?;
        Ok(path)
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn save_attachment(
        &self,
        user: UserId,
        kind: DocumentKind,
        bytes: &[u8],
    ) -> Result<PathBuf, StorageError> {
        let path = self.root.join(format!("{user}_{}.jpg", kind.file_stem()));
        self.write(path, bytes).await
    }

    async fn save_artifact(
        &self,
        _user: UserId,
        filename: &str,
        content: &str,
    ) -> Result<PathBuf, StorageError> {
        let path = self.root.join(filename);
        self.write(path, content.as_bytes()).await
    }

    async fn purge_older_than(&self, ttl: Duration) -> Result<usize, StorageError> {
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|source| StorageError::Scan { path: self.root.clone(), source })?;
        let mut removed = 0;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| StorageError::Scan { path: self.root.clone(), source })?
        {
            let Ok(metadata) = entry.metadata().await else { continue };
            if !metadata.is_file() {
                continue;
            }
            let expired = metadata
                .modified()
                .ok()
                .and_then(|modified| modified.elapsed().ok())
                .is_some_and(|age| age > ttl);
            if !expired {
                continue;
            }
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(error) => {
                    warn!(
                        event_name = "storage.purge.remove_failed",
                        path = %entry.path().display(),
                        error = %error,
                        "could not remove expired document"
                    );
                }
            }
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{DocumentKind, DocumentStore, FsDocumentStore};
    use crate::session::UserId;

    #[tokio::test]
    async fn attachment_paths_are_keyed_by_user_and_kind() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsDocumentStore::new(dir.path()).expect("store");

        let path = store
            .save_attachment(UserId(42), DocumentKind::Identity, b"jpeg-bytes")
            .await
            .expect("save");

        assert!(path.ends_with("42_identity.jpg"));
        assert_eq!(std::fs::read(&path).expect("read back"), b"jpeg-bytes");
    }

    #[tokio::test]
    async fn resubmission_overwrites_in_place() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsDocumentStore::new(dir.path()).expect("store");
        let user = UserId(7);

        let first =
            store.save_attachment(user, DocumentKind::Vehicle, b"first").await.expect("save");
        let second =
            store.save_attachment(user, DocumentKind::Vehicle, b"second").await.expect("save");

        assert_eq!(first, second);
        assert_eq!(std::fs::read(&second).expect("read back"), b"second");
        assert_eq!(std::fs::read_dir(dir.path()).expect("scan").count(), 1);
    }

    #[tokio::test]
    async fn purge_removes_only_expired_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsDocumentStore::new(dir.path()).expect("store");
        store.save_artifact(UserId(1), "policy_1.txt", "stale").await.expect("save");

        // Nothing is older than an hour yet.
        assert_eq!(store.purge_older_than(Duration::from_secs(3600)).await.expect("purge"), 0);
        // Everything is older than zero seconds.
        assert_eq!(store.purge_older_than(Duration::ZERO).await.expect("purge"), 1);
        assert_eq!(std::fs::read_dir(dir.path()).expect("scan").count(), 0);
    }
}
