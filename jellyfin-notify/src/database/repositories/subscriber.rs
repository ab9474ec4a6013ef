//! Subscriber repository (the recipient store).

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::database::models::SubscriberDbModel;
use crate::database::retry::retry_on_sqlite_busy;
use crate::database::time::now_ms;
use crate::{Error, Result};

#[async_trait]
pub trait SubscriberRepository: Send + Sync {
    /// Create the subscriber, or re-activate and refresh an existing one.
    async fn add_subscriber(
        &self,
        chat_id: i64,
        username: Option<&str>,
        first_name: Option<&str>,
    ) -> Result<()>;

    /// Flip the active flag. [`Error::NotFound`] when the chat was never registered.
    async fn set_active(&self, chat_id: i64, active: bool) -> Result<()>;

    async fn list_active(&self) -> Result<Vec<SubscriberDbModel>>;
    async fn is_subscribed(&self, chat_id: i64) -> Result<bool>;
    async fn set_language(&self, chat_id: i64, language_code: &str) -> Result<()>;

    /// Saved language preference, `None` when unset or the chat is unknown.
    async fn get_language(&self, chat_id: i64) -> Result<Option<String>>;
}

/// SQLx implementation of [`SubscriberRepository`].
pub struct SqlxSubscriberRepository {
    pool: SqlitePool,
}

impl SqlxSubscriberRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriberRepository for SqlxSubscriberRepository {
    async fn add_subscriber(
        &self,
        chat_id: i64,
        username: Option<&str>,
        first_name: Option<&str>,
    ) -> Result<()> {
        retry_on_sqlite_busy("subscribers.add", || async {
            let now = now_ms();
            sqlx::query(
                r#"
                INSERT INTO subscribers (chat_id, username, first_name, is_active, created_at, updated_at)
                VALUES (?, ?, ?, 1, ?, ?)
                ON CONFLICT(chat_id) DO UPDATE SET
                    username = COALESCE(excluded.username, subscribers.username),
                    first_name = COALESCE(excluded.first_name, subscribers.first_name),
                    is_active = 1,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(chat_id)
            .bind(username)
            .bind(first_name)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
        .await
    }

    async fn set_active(&self, chat_id: i64, active: bool) -> Result<()> {
        let affected = retry_on_sqlite_busy("subscribers.set_active", || async {
            let result = sqlx::query(
                "UPDATE subscribers SET is_active = ?, updated_at = ? WHERE chat_id = ?",
            )
            .bind(active)
            .bind(now_ms())
            .bind(chat_id)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected())
        })
        .await?;

        if affected == 0 {
            return Err(Error::not_found("Subscriber", chat_id.to_string()));
        }
        Ok(())
    }

    async fn list_active(&self) -> Result<Vec<SubscriberDbModel>> {
        let subscribers = sqlx::query_as::<_, SubscriberDbModel>(
            "SELECT * FROM subscribers WHERE is_active = 1 ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(subscribers)
    }

    async fn is_subscribed(&self, chat_id: i64) -> Result<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM subscribers WHERE chat_id = ? AND is_active = 1")
                .bind(chat_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    async fn set_language(&self, chat_id: i64, language_code: &str) -> Result<()> {
        let affected = retry_on_sqlite_busy("subscribers.set_language", || async {
            let result = sqlx::query(
                "UPDATE subscribers SET language_code = ?, updated_at = ? WHERE chat_id = ?",
            )
            .bind(language_code)
            .bind(now_ms())
            .bind(chat_id)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected())
        })
        .await?;

        if affected == 0 {
            return Err(Error::not_found("Subscriber", chat_id.to_string()));
        }
        Ok(())
    }

    async fn get_language(&self, chat_id: i64) -> Result<Option<String>> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT language_code FROM subscribers WHERE chat_id = ?")
                .bind(chat_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row
            .and_then(|(code,)| code)
            .filter(|code| !code.is_empty()))
    }
}
