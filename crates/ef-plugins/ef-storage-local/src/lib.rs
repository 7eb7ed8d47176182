//! # ef-storage-local
//!
//! Local filesystem implementation of `UploadStore` for form-upload
//! answers. Content-addressable storage with directory sharding: the
//! stored path is derived from the payload's SHA-256 hash, which also
//! deduplicates identical uploads. Original filenames live on the
//! Answer record, not on disk.

use async_trait::async_trait;
use ef_core::traits::UploadStore;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;

pub struct LocalUploadStore {
    /// Root directory for all uploads (e.g., "./data/uploads")
    root_path: PathBuf,
    /// Public URL prefix (e.g., "/static/uploads")
    url_prefix: String,
}

impl LocalUploadStore {
    pub fn new(root: PathBuf, url_prefix: String) -> Self {
        Self {
            root_path: root,
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        }
    }

    /// Sharded relative path: "ab/cd/abcdef...hash[.ext]"
    fn relative_path(hash: &str, extension: Option<&str>) -> String {
        match extension {
            Some(ext) => format!("{}/{}/{}.{}", &hash[0..2], &hash[2..4], hash, ext),
            None => format!("{}/{}/{}", &hash[0..2], &hash[2..4], hash),
        }
    }

    fn absolute(&self, relative: &str) -> PathBuf {
        self.root_path.join(relative)
    }
}

/// A conservative extension taken from the client filename, kept only if
/// it is short and alphanumeric so the path stays shell- and URL-safe.
fn safe_extension(original_filename: &str) -> Option<&str> {
    Path::new(original_filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
}

#[async_trait]
impl UploadStore for LocalUploadStore {
    /// Saves an upload under its SHA-256 hash and returns the relative
    /// stored path.
    async fn save(&self, data: Vec<u8>, original_filename: &str) -> anyhow::Result<String> {
        let mut hasher = Sha256::new();
        hasher.update(&data);
        let hash = hex::encode(hasher.finalize());

        let relative = Self::relative_path(&hash, safe_extension(original_filename));
        let target = self.absolute(&relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        if !target.exists() {
            fs::write(&target, &data).await?;
        }

        Ok(relative)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.url_prefix, path)
    }

    async fn delete(&self, path: &str) -> anyhow::Result<()> {
        let target = self.absolute(path);
        fs::remove_file(&target).await?;
        Ok(())
    }
}
