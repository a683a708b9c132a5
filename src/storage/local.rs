use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::{
    error::{GatewayError, Result},
    models::{public_url, ImageListing},
    storage::traits::ImageStorage,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

pub struct LocalImageStorage {
    root: PathBuf,
}

impl LocalImageStorage {
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            GatewayError::StorageError(format!(
                "Cannot create content directory {}: {}",
                root.display(),
                e
            ))
        })?;

        log::info!("📁 Content directory: {}", root.display());
        Ok(Self { root })
    }

    fn resolve(&self, filename: &str) -> Result<PathBuf> {
        if !is_safe_filename(filename) {
            return Err(GatewayError::NotFound("Image not found".into()));
        }
        Ok(self.root.join(filename))
    }
}

#[async_trait]
impl ImageStorage for LocalImageStorage {
    async fn save(&self, filename: &str, bytes: &[u8]) -> Result<()> {
        let path = self.resolve(filename).map_err(|_| {
            GatewayError::StorageError(format!("Refusing to write '{}'", filename))
        })?;
        tokio::fs::write(&path, bytes).await?;
        log::debug!("Saved {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }

    async fn read(&self, filename: &str) -> Result<Vec<u8>> {
        let path = self.resolve(filename)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound || path.is_dir() => {
                Err(GatewayError::NotFound("Image not found".into()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, limit: usize) -> Result<Vec<ImageListing>> {
        let mut dir = tokio::fs::read_dir(&self.root).await?;
        let mut images = Vec::new();

        while let Some(entry) = dir.next_entry().await? {
            let Ok(filename) = entry.file_name().into_string() else {
                continue;
            };
            if !is_image_file(&filename) {
                continue;
            }

            let metadata = match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => continue,
                Err(e) => {
                    log::warn!("⚠️  Skipping {}: {}", filename, e);
                    continue;
                }
            };
            let timestamp = metadata
                .modified()
                .map(|modified| DateTime::<Utc>::from(modified).timestamp_millis())
                .unwrap_or(0);

            images.push(ImageListing {
                url: public_url(&filename),
                filename,
                timestamp,
                size: metadata.len(),
            });
        }

        images.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| b.filename.cmp(&a.filename))
        });
        images.truncate(limit);
        Ok(images)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(tokio::fs::metadata(&self.root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false))
    }
}

/// A bare file name: one path component, no traversal, no hidden files.
pub fn is_safe_filename(filename: &str) -> bool {
    !filename.is_empty()
        && !filename.starts_with('.')
        && !filename.contains(['/', '\\', '\0'])
        && !filename.contains("..")
}

pub fn is_image_file(filename: &str) -> bool {
    extension(filename)
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

pub fn content_type_for(filename: &str) -> &'static str {
    match extension(filename).as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

fn extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}
