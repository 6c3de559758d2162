//! Parcel image storage on the local filesystem.
//!
//! Files live under `{root}/parcels/` and are served by the HTTP layer at
//! `/uploads/parcels/{file}`. Stored URLs are relative to the public base URL.

use std::path::{Path, PathBuf};

use chrono::Utc;
use thiserror::Error;

/// URL prefix under which the upload root is served.
pub const PUBLIC_PREFIX: &str = "/uploads";

const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("unsupported image type; allowed: jpg, jpeg, png, gif, webp")]
    UnsupportedType,

    #[error("image is empty")]
    Empty,

    #[error("failed to store image: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store an image for `tracking_number` and return its relative URL.
    pub async fn save(&self, tracking_number: &str, file_name: &str, bytes: &[u8]) -> Result<String, UploadError> {
        let ext = check_image(file_name, bytes)?;

        let dir = self.root.join("parcels");
        tokio::fs::create_dir_all(&dir).await?;

        let file = format!("{tracking_number}-{}.{ext}", Utc::now().timestamp_millis());
        tokio::fs::write(dir.join(&file), bytes).await?;

        tracing::info!(tracking_number, file = %file, size_bytes = bytes.len(), "parcel image stored");
        Ok(format!("{PUBLIC_PREFIX}/parcels/{file}"))
    }

    /// Remove a previously stored image. Absolute URLs and unknown paths are ignored.
    pub async fn delete(&self, url: &str) {
        let Some(relative) = url.strip_prefix(PUBLIC_PREFIX).and_then(|p| p.strip_prefix('/')) else {
            return;
        };
        if relative.split('/').any(|seg| seg == ".." || seg.is_empty()) {
            return;
        }
        if let Err(e) = tokio::fs::remove_file(self.root.join(relative)).await {
            tracing::warn!(url, error = %e, "failed to remove parcel image");
        }
    }
}

/// Accept a non-empty file with an image extension. Returns the extension.
pub fn check_image(file_name: &str, bytes: &[u8]) -> Result<String, UploadError> {
    if bytes.is_empty() {
        return Err(UploadError::Empty);
    }
    image_extension(file_name).ok_or(UploadError::UnsupportedType)
}

/// Lower-cased extension if it names an accepted image type.
pub fn image_extension(file_name: &str) -> Option<String> {
    let ext = Path::new(file_name).extension()?.to_str()?.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Prefix a relative image URL with the public base URL.
pub fn absolute_url(public_url: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("{}{}", public_url.trim_end_matches('/'), url)
    }
}
