use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result};
use crate::ext::extension_for_mime;

/// Result of a successful `store`/`store_reader` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub reference: String,
    pub mime_type: String,
    pub size: u64,
    /// `sha256:<hex>`.
    pub checksum: String,
}

/// Content-addressed store for binary media payloads, keyed by the SHA-256
/// of their bytes, deduplicating identical content within a session.
///
/// A single write lock keeps the exists-check and the write atomic with
/// respect to each other; reads take a shared lock. `store` and `delete`
/// both need exclusivity while `load`/`load_reader` only need to observe a
/// consistent filesystem state, so a `tokio::sync::RwLock<()>` stands in
/// for that exclusive/shared split.
///
/// `Clone` is cheap and shares the same lock and root: clones are handles
/// onto the same store, not independent copies.
#[derive(Clone)]
pub struct BlobStore {
    root: PathBuf,
    lock: Arc<RwLock<()>>,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock: Arc::new(RwLock::new(())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist `bytes` under `session_id`, deduplicating on content hash.
    pub async fn store(
        &self,
        cancel: &CancellationToken,
        session_id: &str,
        bytes: &[u8],
        mime: &str,
    ) -> Result<StoredBlob> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let hex = hex_digest(bytes);
        let filename = format!("{}{}", hex, extension_for_mime(mime));
        let session_dir = self.root.join(session_id);
        let path = session_dir.join(&filename);

        let _guard = self.lock.write().await;

        if tokio::fs::try_exists(&path).await? {
            debug!(session_id, %hex, size = bytes.len(), "blob already present, skipping write");
        } else {
            tokio::fs::create_dir_all(&session_dir).await?;
            tokio::fs::write(&path, bytes).await?;
            debug!(session_id, %hex, size = bytes.len(), "wrote blob");
        }

        let reference = format!("file://{}/{}", session_id, filename);
        Ok(StoredBlob {
            reference,
            mime_type: mime.to_string(),
            size: bytes.len() as u64,
            checksum: format!("sha256:{}", hex),
        })
    }

    /// Drain `reader` fully, then delegate to `store`.
    pub async fn store_reader<R>(
        &self,
        cancel: &CancellationToken,
        session_id: &str,
        mut reader: R,
        mime: &str,
    ) -> Result<StoredBlob>
    where
        R: AsyncRead + Unpin,
    {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await?;
        self.store(cancel, session_id, &bytes, mime).await
    }

    /// Resolve `reference` to bytes.
    pub async fn load(&self, cancel: &CancellationToken, reference: &str) -> Result<Vec<u8>> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let path = self.resolve(reference)?;
        let _guard = self.lock.read().await;
        Ok(tokio::fs::read(&path).await?)
    }

    /// Open `reference` for streaming reads. Caller is responsible for
    /// closing (dropping) the returned file.
    pub async fn load_reader(
        &self,
        cancel: &CancellationToken,
        reference: &str,
    ) -> Result<tokio::fs::File> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let path = self.resolve(reference)?;
        let _guard = self.lock.read().await;
        Ok(tokio::fs::File::open(&path).await?)
    }

    /// Remove the blob backing `reference`. A missing file is not an error.
    pub async fn delete(&self, cancel: &CancellationToken, reference: &str) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let path = self.resolve(reference)?;
        let _guard = self.lock.write().await;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Release any open handles. The current implementation keeps none
    /// open between calls, so this is a no-op kept for contract symmetry
    /// with `EventStore::close`.
    pub async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn resolve(&self, reference: &str) -> Result<PathBuf> {
        let rel = reference
            .strip_prefix("file://")
            .ok_or_else(|| Error::InvalidRef(reference.to_string()))?;
        let path = Path::new(rel);
        if path.is_absolute() {
            Ok(path.to_path_buf())
        } else {
            Ok(self.root.join(path))
        }
    }
}

fn hex_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dedups_identical_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        let cancel = CancellationToken::new();

        let a = store
            .store(&cancel, "s1", b"duplicate", "text/plain")
            .await
            .unwrap();
        let b = store
            .store(&cancel, "s1", b"duplicate", "text/plain")
            .await
            .unwrap();

        assert_eq!(a.reference, b.reference);
        assert_eq!(a.checksum, b.checksum);
        assert!(a.checksum.starts_with("sha256:"));

        let path = dir.path().join("s1").join(format!(
            "{}.bin",
            a.checksum.strip_prefix("sha256:").unwrap()
        ));
        let metadata = tokio::fs::metadata(&path).await.unwrap();
        assert_eq!(metadata.len(), 9);
    }

    #[tokio::test]
    async fn load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        let cancel = CancellationToken::new();

        let stored = store
            .store(&cancel, "s1", b"hello world", "text/plain")
            .await
            .unwrap();
        let loaded = store.load(&cancel, &stored.reference).await.unwrap();
        assert_eq!(loaded, b"hello world");
    }

    #[tokio::test]
    async fn delete_missing_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        let cancel = CancellationToken::new();

        store
            .delete(&cancel, "file://s1/doesnotexist.bin")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn cancellation_is_honored_on_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = store
            .store(&cancel, "s1", b"data", "text/plain")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
