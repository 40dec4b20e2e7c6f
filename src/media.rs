//! Disk-backed [`MediaStore`].
//!
//! Paths are relative to `[media] root`; URLs are `[media] base_url`
//! joined with the path.

use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Result};
use async_trait::async_trait;
use newsroll_core::media::MediaStore;

use crate::config::MediaConfig;

pub struct DiskMediaStore {
    root: PathBuf,
    base_url: String,
}

impl DiskMediaStore {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            root: config.root.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Resolve a stored path under the root. Absolute paths and `..` are rejected.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let rel = Path::new(path.trim_start_matches('/'));
        if rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            bail!("media path escapes the media root: {}", path);
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl MediaStore for DiskMediaStore {
    async fn exists(&self, path: &str) -> Result<bool> {
        let full = self.resolve(path)?;
        Ok(tokio::fs::try_exists(&full).await?)
    }

    async fn put(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, bytes).await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}
