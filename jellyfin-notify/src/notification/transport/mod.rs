//! Chat transport contract.
//!
//! Adapters classify their own failures into [`SendError`] so the delivery
//! loop never inspects provider-specific error text.

mod telegram;

pub use telegram::{TelegramTransport, classify_failure};

use async_trait::async_trait;
use bytes::Bytes;

/// Why a single send failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// The recipient can never be reached again through this channel
    /// (blocked the bot, deactivated account, chat gone).
    #[error("recipient unreachable: {0}")]
    RecipientUnreachable(String),

    /// Anything else; the recipient stays active.
    #[error("transient send failure: {0}")]
    Transient(String),
}

impl SendError {
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::RecipientUnreachable(_))
    }
}

/// A single inline button attached to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineAction {
    pub label: String,
    pub callback_data: String,
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        action: Option<&InlineAction>,
    ) -> Result<(), SendError>;

    async fn send_photo(
        &self,
        chat_id: i64,
        photo: Bytes,
        caption: &str,
        action: Option<&InlineAction>,
    ) -> Result<(), SendError>;
}
