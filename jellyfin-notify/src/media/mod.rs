//! Media server access.

mod jellyfin;

pub use jellyfin::{JellyfinClient, MediaItem};

use async_trait::async_trait;
use bytes::Bytes;

use crate::Result;

/// Read-only media server capabilities used by the broadcaster.
#[async_trait]
pub trait MediaClient: Send + Sync {
    /// Primary image for an item. Best-effort: callers degrade to text on error.
    async fn fetch_poster(&self, content_id: &str) -> Result<Bytes>;

    /// Most recently added movies and episodes.
    async fn recent_items(&self, limit: usize) -> Result<Vec<MediaItem>>;

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<MediaItem>>;
}
