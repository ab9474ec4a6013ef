//! Content ledger repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::database::models::ContentCacheDbModel;
use crate::database::retry::retry_on_sqlite_busy;
use crate::database::time::now_ms;
use crate::domain::ContentType;
use crate::{Error, Result};

/// Durable set of media item ids that have already been announced.
#[async_trait]
pub trait ContentLedger: Send + Sync {
    async fn exists(&self, content_id: &str) -> Result<bool>;

    /// Record an item. Never overwrites: an existing id yields [`Error::AlreadyExists`].
    async fn insert(&self, content_id: &str, title: &str, content_type: ContentType) -> Result<()>;

    async fn get(&self, content_id: &str) -> Result<ContentCacheDbModel>;
}

/// SQLx implementation of [`ContentLedger`].
pub struct SqlxContentLedger {
    pool: SqlitePool,
}

impl SqlxContentLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContentLedger for SqlxContentLedger {
    async fn exists(&self, content_id: &str) -> Result<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM content_cache WHERE jellyfin_id = ? LIMIT 1")
                .bind(content_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    async fn insert(&self, content_id: &str, title: &str, content_type: ContentType) -> Result<()> {
        let result = retry_on_sqlite_busy("content_cache.insert", || async {
            sqlx::query(
                r#"
                INSERT INTO content_cache (jellyfin_id, title, content_type, created_at)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(content_id)
            .bind(title)
            .bind(content_type.as_str())
            .bind(now_ms())
            .execute(&self.pool)
            .await?;
            Ok(())
        })
        .await;

        match result {
            Err(e) if e.is_unique_violation() => Err(Error::already_exists("ContentCache", content_id)),
            other => other,
        }
    }

    async fn get(&self, content_id: &str) -> Result<ContentCacheDbModel> {
        sqlx::query_as::<_, ContentCacheDbModel>("SELECT * FROM content_cache WHERE jellyfin_id = ?")
            .bind(content_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found("ContentCache", content_id))
    }
}
