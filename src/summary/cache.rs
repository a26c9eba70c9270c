//! Summary image cache slot
//!
//! A single named slot holding the latest rendered summary PNG. Readers
//! either see the previous image or the new one, never a partial write.

use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

const SUMMARY_FILE: &str = "summary.png";

/// Storage for the summary artifact
#[async_trait]
pub trait SummaryCache: Send + Sync {
    /// Replace the cached image.
    async fn put(&self, png: Vec<u8>) -> Result<()>;

    /// Current image, `None` if nothing has been generated yet.
    async fn get(&self) -> Result<Option<Vec<u8>>>;

    /// Whether an image has been generated.
    async fn exists(&self) -> Result<bool>;
}

/// Summary cache stored as `<dir>/summary.png`
pub struct FsSummaryCache {
    dir: PathBuf,
    path: PathBuf,
}

impl FsSummaryCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let path = dir.join(SUMMARY_FILE);
        Self { dir, path }
    }

    /// Location of the cached image
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SummaryCache for FsSummaryCache {
    async fn put(&self, png: Vec<u8>) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        // Same directory as the target so the rename cannot cross filesystems
        let tmp = self
            .dir
            .join(format!(".{}.{}.tmp", SUMMARY_FILE, uuid::Uuid::new_v4()));
        if let Err(e) = tokio::fs::write(&tmp, &png).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        tracing::debug!(path = %self.path.display(), bytes = png.len(), "Summary image written");
        Ok(())
    }

    async fn get(&self) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self) -> Result<bool> {
        Ok(tokio::fs::try_exists(&self.path).await?)
    }
}

/// In-memory summary cache
#[derive(Default)]
pub struct MemorySummaryCache {
    slot: RwLock<Option<Vec<u8>>>,
}

impl MemorySummaryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SummaryCache for MemorySummaryCache {
    async fn put(&self, png: Vec<u8>) -> Result<()> {
        *self.slot.write().await = Some(png);
        Ok(())
    }

    async fn get(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.slot.read().await.clone())
    }

    async fn exists(&self) -> Result<bool> {
        Ok(self.slot.read().await.is_some())
    }
}
