//! Muted series repository (the mute store).

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::database::models::MutedSeriesDbModel;
use crate::database::retry::retry_on_sqlite_busy;
use crate::database::time::now_ms;
use crate::{Error, Result};

#[async_trait]
pub trait MutedSeriesRepository: Send + Sync {
    /// Mute a series for a chat. Muting twice is not an error.
    async fn add_muted_series(&self, chat_id: i64, series_id: &str, series_name: &str) -> Result<()>;

    /// Unmute. [`Error::NotFound`] when the series was not muted.
    async fn remove_muted_series(&self, chat_id: i64, series_id: &str) -> Result<()>;

    async fn list_muted_series(&self, chat_id: i64) -> Result<Vec<MutedSeriesDbModel>>;
    async fn is_muted(&self, chat_id: i64, series_id: &str) -> Result<bool>;
}

/// SQLx implementation of [`MutedSeriesRepository`].
pub struct SqlxMutedSeriesRepository {
    pool: SqlitePool,
}

impl SqlxMutedSeriesRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MutedSeriesRepository for SqlxMutedSeriesRepository {
    async fn add_muted_series(&self, chat_id: i64, series_id: &str, series_name: &str) -> Result<()> {
        retry_on_sqlite_busy("muted_series.add", || async {
            sqlx::query(
                r#"
                INSERT INTO muted_series (chat_id, series_id, series_name, created_at)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(chat_id, series_id) DO NOTHING
                "#,
            )
            .bind(chat_id)
            .bind(series_id)
            .bind(series_name)
            .bind(now_ms())
            .execute(&self.pool)
            .await?;
            Ok(())
        })
        .await
    }

    async fn remove_muted_series(&self, chat_id: i64, series_id: &str) -> Result<()> {
        let affected = retry_on_sqlite_busy("muted_series.remove", || async {
            let result = sqlx::query("DELETE FROM muted_series WHERE chat_id = ? AND series_id = ?")
                .bind(chat_id)
                .bind(series_id)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected())
        })
        .await?;

        if affected == 0 {
            return Err(Error::not_found("MutedSeries", format!("{chat_id}/{series_id}")));
        }
        Ok(())
    }

    async fn list_muted_series(&self, chat_id: i64) -> Result<Vec<MutedSeriesDbModel>> {
        let rows = sqlx::query_as::<_, MutedSeriesDbModel>(
            "SELECT * FROM muted_series WHERE chat_id = ? ORDER BY series_name",
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn is_muted(&self, chat_id: i64, series_id: &str) -> Result<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM muted_series WHERE chat_id = ? AND series_id = ? LIMIT 1")
                .bind(chat_id)
                .bind(series_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }
}
