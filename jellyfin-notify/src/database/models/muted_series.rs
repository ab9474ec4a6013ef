//! Per-subscriber series mute model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MutedSeriesDbModel {
    pub id: i64,
    pub chat_id: i64,
    /// Series key; currently the series name as carried by the webhook.
    pub series_id: String,
    pub series_name: String,
    pub created_at: i64,
}
