use crate::{error::Result, models::ImageListing};
use async_trait::async_trait;

/// Content directory backing the gallery.
///
/// Files are written once and never mutated; the listing is recomputed from
/// what is present on every call.
#[async_trait]
pub trait ImageStorage: Send + Sync {
    async fn save(&self, filename: &str, bytes: &[u8]) -> Result<()>;

    async fn read(&self, filename: &str) -> Result<Vec<u8>>;

    /// Newest first, at most `limit` entries.
    async fn list(&self, limit: usize) -> Result<Vec<ImageListing>>;

    async fn health_check(&self) -> Result<bool>;
}
