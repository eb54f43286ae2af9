//! Object storage for transient inputs and finished documents.
//!
//! Keys are `/`-separated relative paths such as
//! `uploads/<job_id>/document.pdf`. Storage errors surface as
//! [`AssignmentError::UpstreamGeneration`] with stage `storage`: for the
//! worker a failed bucket write is just another collaborator failure.

use crate::error::AssignmentError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), AssignmentError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, AssignmentError>;

    /// Remove an object. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), AssignmentError>;
}

/// Key of the uploaded source document of a job.
pub fn document_key(job_id: Uuid) -> String {
    format!("uploads/{job_id}/document.pdf")
}

/// Key of the uploaded custom cover of a job.
pub fn cover_key(job_id: Uuid) -> String {
    format!("uploads/{job_id}/cover.pdf")
}

/// Key of the finished document of a job.
pub fn output_key(prefix: &str, job_id: Uuid) -> String {
    if prefix.is_empty() {
        format!("{job_id}.pdf")
    } else {
        format!("{prefix}/{job_id}.pdf")
    }
}

fn storage_err(message: impl std::fmt::Display) -> AssignmentError {
    AssignmentError::upstream("storage", message)
}

// ── In-memory ────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct InMemoryStorage {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.objects.read().await.contains_key(key)
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStorage for InMemoryStorage {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), AssignmentError> {
        self.objects.write().await.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, AssignmentError> {
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| storage_err(format!("object '{key}' not found")))
    }

    async fn delete(&self, key: &str) -> Result<(), AssignmentError> {
        self.objects.write().await.remove(key);
        Ok(())
    }
}

// ── Filesystem ───────────────────────────────────────────────────────────

/// Objects as files under a root directory.
///
/// Writes go to a sibling `.tmp` file first and are renamed into place, so a
/// reader never sees a half-written PDF.
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path of `key`. Absolute keys and `..` segments are rejected.
    pub fn path_of(&self, key: &str) -> Result<PathBuf, AssignmentError> {
        let rel = Path::new(key);
        let safe = !key.is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(storage_err(format!("invalid object key '{key}'")));
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl ObjectStorage for FsStorage {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), AssignmentError> {
        let path = self.path_of(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_err(format!("create {}: {e}", parent.display())))?;
        }

        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);
        tokio::fs::write(&tmp_path, &bytes)
            .await
            .map_err(|e| storage_err(format!("write {}: {e}", tmp_path.display())))?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| storage_err(format!("rename into {}: {e}", path.display())))?;

        debug!("Stored {} bytes at {}", bytes.len(), path.display());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, AssignmentError> {
        let path = self.path_of(key)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| storage_err(format!("read {}: {e}", path.display())))
    }

    async fn delete(&self, key: &str) -> Result<(), AssignmentError> {
        let path = self.path_of(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_err(format!("delete {}: {e}", path.display()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout() {
        let id = Uuid::nil();
        assert_eq!(
            document_key(id),
            "uploads/00000000-0000-0000-0000-000000000000/document.pdf"
        );
        assert_eq!(
            output_key("assignments", id),
            "assignments/00000000-0000-0000-0000-000000000000.pdf"
        );
        assert_eq!(output_key("", id), "00000000-0000-0000-0000-000000000000.pdf");
    }

    #[tokio::test]
    async fn memory_put_get_delete() {
        let s = InMemoryStorage::new();
        s.put("a/b.pdf", vec![1, 2, 3]).await.unwrap();
        assert_eq!(s.get("a/b.pdf").await.unwrap(), vec![1, 2, 3]);
        s.delete("a/b.pdf").await.unwrap();
        s.delete("a/b.pdf").await.unwrap();
        assert!(matches!(
            s.get("a/b.pdf").await.unwrap_err(),
            AssignmentError::UpstreamGeneration { .. }
        ));
    }

    #[tokio::test]
    async fn fs_round_trip_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let s = FsStorage::new(dir.path());
        s.put("uploads/x/document.pdf", b"%PDF".to_vec()).await.unwrap();

        let stored = dir.path().join("uploads/x/document.pdf");
        assert!(stored.exists());
        assert!(!dir.path().join("uploads/x/document.pdf.tmp").exists());
        assert_eq!(s.get("uploads/x/document.pdf").await.unwrap(), b"%PDF");

        s.delete("uploads/x/document.pdf").await.unwrap();
        assert!(!stored.exists());
        s.delete("uploads/x/document.pdf").await.unwrap();
    }

    #[test]
    fn fs_rejects_escaping_keys() {
        let s = FsStorage::new("/srv/objects");
        assert!(s.path_of("../etc/passwd").is_err());
        assert!(s.path_of("/etc/passwd").is_err());
        assert!(s.path_of("").is_err());
        assert_eq!(
            s.path_of("a/b.pdf").unwrap(),
            PathBuf::from("/srv/objects/a/b.pdf")
        );
    }
}
