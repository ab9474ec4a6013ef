//! Content ledger model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A media item that has already been announced.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ContentCacheDbModel {
    pub id: i64,
    /// Media-server item id (the idempotency key).
    pub jellyfin_id: String,
    pub title: String,
    /// `Movie` or `Episode`.
    pub content_type: String,
    pub created_at: i64,
}

impl ContentCacheDbModel {
    pub fn get_created_at(&self) -> DateTime<Utc> {
        crate::database::time::ms_to_datetime(self.created_at)
    }
}
