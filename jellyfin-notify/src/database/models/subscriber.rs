//! Subscriber (recipient) model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A Telegram chat that receives notifications.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SubscriberDbModel {
    pub id: i64,
    pub chat_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    /// Preferred catalog language; `None` means the default.
    pub language_code: Option<String>,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl SubscriberDbModel {
    pub fn get_created_at(&self) -> DateTime<Utc> {
        crate::database::time::ms_to_datetime(self.created_at)
    }

    pub fn get_updated_at(&self) -> DateTime<Utc> {
        crate::database::time::ms_to_datetime(self.updated_at)
    }
}
