//! Media blob storage abstraction and orphan cleanup.
//!
//! The [`MediaStore`] trait is the contract newsroll needs from a blob
//! store: store bytes under a path, check, delete, and resolve a public
//! URL. [`InMemoryMediaStore`] backs the tests; the application crate
//! provides a disk implementation.

use std::collections::{BTreeMap, HashSet};
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tracing::{error, info};

#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn exists(&self, path: &str) -> Result<bool>;

    async fn put(&self, path: &str, bytes: &[u8]) -> Result<()>;

    async fn delete(&self, path: &str) -> Result<()>;

    /// Public URL for a stored path.
    fn url(&self, path: &str) -> String;
}

/// Delete every path in `incoming` that `reference` does not contain.
///
/// Blank paths are ignored, paths missing from the store are logged and
/// skipped, and delete failures are logged without aborting. Returns the
/// paths that were actually deleted.
pub async fn delete_orphans<M: MediaStore + ?Sized>(
    media: &M,
    incoming: &[String],
    reference: &[String],
) -> Vec<String> {
    let keep: HashSet<&str> = reference.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    let mut deleted = Vec::new();

    for p in incoming {
        if p.trim().is_empty() || keep.contains(p.as_str()) || !seen.insert(p.as_str()) {
            continue;
        }

        match media.exists(p).await {
            Ok(true) => match media.delete(p).await {
                Ok(()) => deleted.push(p.clone()),
                Err(e) => error!(pic = %p, err = %e, "error while deleting pic"),
            },
            Ok(false) => info!(pic = %p, "pic not found in media store (skipped)"),
            Err(e) => error!(pic = %p, err = %e, "error while checking pic"),
        }
    }

    deleted
}

/// In-memory media store for tests.
pub struct InMemoryMediaStore {
    blobs: RwLock<BTreeMap<String, Vec<u8>>>,
    failing: RwLock<HashSet<String>>,
    base_url: String,
}

impl InMemoryMediaStore {
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(BTreeMap::new()),
            failing: RwLock::new(HashSet::new()),
            base_url: "/storage".to_string(),
        }
    }

    /// Make every later delete of `path` fail.
    pub fn fail_deletes_of(&self, path: &str) {
        self.failing.write().unwrap().insert(path.to_string());
    }

    pub fn paths(&self) -> Vec<String> {
        self.blobs.read().unwrap().keys().cloned().collect()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.blobs.read().unwrap().contains_key(path)
    }
}

impl Default for InMemoryMediaStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaStore for InMemoryMediaStore {
    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.contains(path))
    }

    async fn put(&self, path: &str, bytes: &[u8]) -> Result<()> {
        self.blobs
            .write()
            .unwrap()
            .insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        if self.failing.read().unwrap().contains(path) {
            return Err(anyhow!("simulated delete failure for {}", path));
        }
        self.blobs.write().unwrap().remove(path);
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    async fn seeded(v: &[&str]) -> InMemoryMediaStore {
        let media = InMemoryMediaStore::new();
        for p in v {
            media.put(p, b"img").await.unwrap();
        }
        media
    }

    #[tokio::test]
    async fn test_deletes_exactly_the_difference() {
        let media = seeded(&["a.webp", "b.webp", "c.webp"]).await;
        let deleted = delete_orphans(
            &media,
            &paths(&["a.webp", "b.webp", "c.webp"]),
            &paths(&["b.webp"]),
        )
        .await;
        assert_eq!(deleted, paths(&["a.webp", "c.webp"]));
        assert_eq!(media.paths(), paths(&["b.webp"]));
    }

    #[tokio::test]
    async fn test_never_deletes_reference_paths() {
        let media = seeded(&["a.webp", "b.webp"]).await;
        let deleted = delete_orphans(
            &media,
            &paths(&["a.webp", "b.webp"]),
            &paths(&["a.webp", "b.webp", "z.webp"]),
        )
        .await;
        assert!(deleted.is_empty());
        assert_eq!(media.paths().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_and_blank_paths_are_skipped() {
        let media = seeded(&["a.webp"]).await;
        let incoming = paths(&["", "  ", "ghost.webp", "a.webp"]);
        let deleted = delete_orphans(&media, &incoming, &[]).await;
        assert_eq!(deleted, paths(&["a.webp"]));
    }

    #[tokio::test]
    async fn test_delete_failure_does_not_abort() {
        let media = seeded(&["a.webp", "b.webp"]).await;
        media.fail_deletes_of("a.webp");
        let deleted = delete_orphans(&media, &paths(&["a.webp", "b.webp"]), &[]).await;
        assert_eq!(deleted, paths(&["b.webp"]));
        assert!(media.contains("a.webp"));
    }

    #[test]
    fn test_url() {
        let media = InMemoryMediaStore::new();
        assert_eq!(media.url("/uploads/x.webp"), "/storage/uploads/x.webp");
    }
}
