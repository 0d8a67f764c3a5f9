//! Local filesystem backend.
//!
//! Keys map to relative paths under a root directory. Retrieval and upload
//! references point at the API's storage routes; the local backend has no
//! signing, so `ttl` is accepted and ignored.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::{StorageError, StorageResult};
use crate::store::BlobStore;

/// Route serving downloads from the local store.
pub const DOWNLOAD_ROUTE: &str = "/api/storage/download";
/// Route accepting uploads into the local store.
pub const UPLOAD_ROUTE: &str = "/api/storage/upload";

/// Reject keys that could escape the storage root.
///
/// A valid key is a non-empty `/`-separated relative path whose segments
/// are neither empty nor `.`/`..`, with no backslashes or control characters.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() || key.starts_with('/') || key.contains('\\') {
        return Err(StorageError::invalid_key(key));
    }
    if key.chars().any(|c| c.is_control()) {
        return Err(StorageError::invalid_key(key));
    }
    if key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(StorageError::invalid_key(key));
    }
    Ok(())
}

/// Blob store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path for a validated key.
    pub fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    fn route_url(&self, route: &str, key: &str) -> String {
        format!(
            "{}{}?key={}",
            self.public_base_url,
            route,
            urlencoding::encode(key)
        )
    }

    async fn ensure_parent(path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Rename a fully written temp file into place, so readers never see a
    /// partial object. A failed write or rename removes the temp file.
    async fn commit(
        written: StorageResult<()>,
        tmp: &Path,
        dest: &Path,
    ) -> StorageResult<()> {
        let result = match written {
            Ok(()) => tokio::fs::rename(tmp, dest).await.map_err(StorageError::from),
            Err(e) => Err(e),
        };

        if result.is_err() {
            if let Err(e) = tokio::fs::remove_file(tmp).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove {}: {}", tmp.display(), e);
                }
            }
        }
        result
    }

    fn part_path(dest: &Path) -> PathBuf {
        let mut name = dest.as_os_str().to_owned();
        name.push(".part");
        PathBuf::from(name)
    }
}

fn map_missing(err: std::io::Error, key: &str) -> StorageError {
    if err.kind() == std::io::ErrorKind::NotFound {
        StorageError::not_found(key)
    } else {
        StorageError::Io(err)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn upload(&self, local_file: &Path, key: &str) -> StorageResult<()> {
        let dest = self.path_for(key)?;
        Self::ensure_parent(&dest).await?;

        let tmp = Self::part_path(&dest);
        let written = tokio::fs::copy(local_file, &tmp)
            .await
            .map(|_| ())
            .map_err(|e| StorageError::upload_failed(format!("{}: {}", local_file.display(), e)));
        Self::commit(written, &tmp, &dest).await?;

        info!("Stored {} as {}", local_file.display(), key);
        Ok(())
    }

    async fn download(&self, key: &str, local_file: &Path) -> StorageResult<()> {
        let src = self.path_for(key)?;
        Self::ensure_parent(local_file).await?;

        tokio::fs::copy(&src, local_file)
            .await
            .map_err(|e| map_missing(e, key))?;

        debug!("Copied {} to {}", key, local_file.display());
        Ok(())
    }

    async fn upload_bytes(&self, data: Vec<u8>, key: &str) -> StorageResult<()> {
        let dest = self.path_for(key)?;
        Self::ensure_parent(&dest).await?;

        let tmp = Self::part_path(&dest);
        let written = tokio::fs::write(&tmp, &data).await.map_err(StorageError::from);
        Self::commit(written, &tmp, &dest).await?;

        info!("Stored {} bytes as {}", data.len(), key);
        Ok(())
    }

    async fn download_bytes(&self, key: &str) -> StorageResult<Vec<u8>> {
        let path = self.path_for(key)?;
        tokio::fs::read(&path).await.map_err(|e| map_missing(e, key))
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.path_for(key)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn retrieval_url(&self, key: &str, _ttl: Duration) -> StorageResult<String> {
        validate_key(key)?;
        Ok(self.route_url(DOWNLOAD_ROUTE, key))
    }

    async fn upload_url(&self, key: &str, _ttl: Duration) -> StorageResult<String> {
        validate_key(key)?;
        Ok(self.route_url(UPLOAD_ROUTE, key))
    }

    async fn check_connectivity(&self) -> StorageResult<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        for key in ["uploads/a.mp4", "results/abc-123.mp4", "a"] {
            assert!(validate_key(key).is_ok(), "{key} should be valid");
        }
        for key in [
            "",
            "/etc/passwd",
            "../secret",
            "uploads/../../x",
            "uploads//a.mp4",
            "uploads/",
            "./a.mp4",
            "a\\b",
            "a\nb",
        ] {
            assert!(
                matches!(validate_key(key), Err(StorageError::InvalidKey(_))),
                "{key:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_upload_download_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path().join("blobs"), "http://localhost:8000/");

        let src = dir.path().join("in.mp4");
        tokio::fs::write(&src, b"video bytes").await.unwrap();

        store.upload(&src, "results/job.mp4").await.unwrap();
        assert!(store.exists("results/job.mp4").await.unwrap());
        assert!(!store.exists("results/other.mp4").await.unwrap());

        let out = dir.path().join("work").join("out.mp4");
        store.download("results/job.mp4", &out).await.unwrap();
        assert_eq!(tokio::fs::read(&out).await.unwrap(), b"video bytes");
        assert!(!dir.path().join("blobs/results/job.mp4.part").exists());
    }

    #[tokio::test]
    async fn test_failed_rename_leaves_no_part_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("blobs");
        let store = LocalBlobStore::new(&root, "http://localhost:8000");

        // A non-empty directory where the object should land blocks the rename
        let blocker = root.join("results/job.mp4");
        tokio::fs::create_dir_all(blocker.join("inner")).await.unwrap();

        assert!(store
            .upload_bytes(b"clip".to_vec(), "results/job.mp4")
            .await
            .is_err());
        assert!(!root.join("results/job.mp4.part").exists());

        let src = dir.path().join("in.mp4");
        tokio::fs::write(&src, b"clip").await.unwrap();
        assert!(store.upload(&src, "results/job.mp4").await.is_err());
        assert!(!root.join("results/job.mp4.part").exists());
    }

    #[tokio::test]
    async fn test_download_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "http://localhost:8000");

        let err = store
            .download("uploads/missing.mp4", &dir.path().join("x.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));

        let err = store.download_bytes("uploads/missing.mp4").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_traversal_rejected_before_touching_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path().join("root"), "http://localhost:8000");

        let err = store
            .upload_bytes(b"x".to_vec(), "../escape.mp4")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
        assert!(!dir.path().join("escape.mp4").exists());
    }

    #[tokio::test]
    async fn test_urls_point_at_storage_routes() {
        let store = LocalBlobStore::new("/tmp/unused", "http://localhost:8000/");
        let ttl = Duration::from_secs(3600);

        assert_eq!(
            store.retrieval_url("results/a b.mp4", ttl).await.unwrap(),
            "http://localhost:8000/api/storage/download?key=results%2Fa%20b.mp4"
        );
        assert_eq!(
            store.upload_url("uploads/x.mp4", ttl).await.unwrap(),
            "http://localhost:8000/api/storage/upload?key=uploads%2Fx.mp4"
        );
        assert!(store.retrieval_url("../x", ttl).await.is_err());
    }
}
