//! Blob store for uploaded diagram images: `<root>/<uuid>.<ext>`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use uuid::Uuid;

/// Filesystem-backed image store.
#[derive(Debug, Clone)]
pub struct ImageStorage {
    root: PathBuf,
}

impl ImageStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Persist image bytes; returns the relative path stored on the record.
    pub async fn save(&self, bytes: &[u8], content_type: &str) -> Result<String> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .context("Failed to create storage directory")?;
        let file_name = format!("{}.{}", Uuid::new_v4(), extension_for(content_type));
        tokio::fs::write(self.root.join(&file_name), bytes)
            .await
            .context("Failed to write image file")?;
        Ok(file_name)
    }

    pub fn full_path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Read a stored image; `None` when the file is absent.
    pub async fn read(&self, relative: &str) -> Result<Option<Vec<u8>>> {
        let path = self.full_path(relative);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read image {}", path.display())),
        }
    }
}

/// Guess a content type from magic bytes; defaults to PNG.
pub fn sniff_content_type(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        "image/png"
    } else if bytes.starts_with(b"\xff\xd8\xff") {
        "image/jpeg"
    } else if bytes.len() >= 12 && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/png"
    }
}

/// File extension for a content type.
pub fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}

/// Media type inferred from a stored file's extension.
pub fn media_type_for_path(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}
