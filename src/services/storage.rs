// src/services/storage.rs
use chrono::Utc;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::errors::EaselError;

/// Filesystem-backed object store. Every put writes a fresh key derived
/// from the wall clock plus a random suffix, so writes are independent and
/// no key is ever reused or updated. Objects are served publicly by the
/// static mount; this type only owns the write path and URL construction.
#[derive(Debug)]
pub struct ObjectStore {
    root: PathBuf,
    public_base: String,
}

impl ObjectStore {
    pub fn new(root: impl Into<PathBuf>, public_base: impl Into<String>) -> Result<Self, EaselError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| {
            EaselError::StorageUnavailable(format!(
                "cannot create object store at {}: {}",
                root.display(),
                e
            ))
        })?;
        Ok(Self {
            root,
            public_base: public_base.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes `bytes` under a fresh key and returns the public URL.
    pub async fn put(&self, bytes: &[u8]) -> Result<String, EaselError> {
        let key = make_key();
        let path = self.root.join(&key);
        tokio::fs::write(&path, bytes).await.map_err(|e| {
            EaselError::StorageUnavailable(format!("write to {} failed: {}", path.display(), e))
        })?;
        log::info!("stored object {} ({} bytes)", key, bytes.len());
        Ok(format!("{}/{}", self.public_base, key))
    }
}

/// Millisecond timestamp plus a short random suffix: collision-resistant
/// without any coordinating state.
fn make_key() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}.png", Utc::now().timestamp_millis(), &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_writes_the_object_and_builds_the_url() {
        let dir = tempfile::tempdir().unwrap();
        // Trailing slash on the base must not double up in the URL.
        let store = ObjectStore::new(dir.path(), "https://img.example.com/objects/").unwrap();

        let url = store.put(b"png bytes").await.unwrap();
        assert!(url.starts_with("https://img.example.com/objects/"));
        assert!(url.ends_with(".png"));
        assert!(!url.contains("//objects//"));

        let key = url.rsplit('/').next().unwrap();
        let stored = std::fs::read(dir.path().join(key)).unwrap();
        assert_eq!(stored, b"png bytes");
    }

    #[tokio::test]
    async fn keys_never_collide_across_puts() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::new(dir.path(), "http://localhost/objects").unwrap();

        let a = store.put(b"one").await.unwrap();
        let b = store.put(b"two").await.unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn unwritable_root_is_storage_unavailable() {
        let err = ObjectStore::new("/proc/easel-cannot-exist/objects", "http://x").unwrap_err();
        assert_eq!(err.code(), "STORAGE_UNAVAILABLE");
    }
}
