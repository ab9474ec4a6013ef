//! Telegram Bot API transport.
//!
//! Sends via `POST /bot<token>/sendMessage` and `/sendPhoto`. Handles 429 rate
//! limits by respecting the `parameters.retry_after` field returned in the
//! JSON response body.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::{ChatTransport, InlineAction, SendError};
use crate::config::TelegramSettings;

/// Maximum number of retries for rate-limited requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Telegram `sendMessage` text limit (UTF-8 characters).
const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

/// Telegram `sendPhoto` caption limit (UTF-8 characters).
const TELEGRAM_CAPTION_LIMIT: usize = 1024;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Error body returned by the Bot API.
#[derive(Debug, Default, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    description: String,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

/// Telegram Bot API transport.
pub struct TelegramTransport {
    api_base: String,
    bot_token: String,
    client: Client,
}

impl TelegramTransport {
    pub fn new(settings: &TelegramSettings) -> crate::Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            bot_token: settings.bot_token.clone(),
            client,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }

    /// Send a request with rate limit handling.
    ///
    /// `build` is invoked once per attempt since multipart bodies cannot be reused.
    async fn send_with_retry<F>(&self, method: &str, build: F) -> Result<(), SendError>
    where
        F: Fn(RequestBuilder) -> RequestBuilder + Send + Sync,
    {
        let url = self.method_url(method);
        let mut attempts = 0;

        loop {
            attempts += 1;

            let response = build(self.client.post(&url))
                .send()
                .await
                .map_err(|e| SendError::Transient(format!("Telegram request failed: {}", e.without_url())))?;

            let status = response.status();

            if status.is_success() {
                return Ok(());
            }

            let body: ApiResponse = response.json().await.unwrap_or_default();

            if status.as_u16() == 429 {
                let retry_after = body
                    .parameters
                    .and_then(|p| p.retry_after)
                    .map(Duration::from_secs);

                if attempts >= MAX_RATE_LIMIT_RETRIES {
                    warn!(
                        "Telegram rate limit: max retries ({}) exceeded, last retry_after was {:?}",
                        MAX_RATE_LIMIT_RETRIES, retry_after
                    );
                    return Err(SendError::Transient(format!(
                        "Telegram rate limit exceeded after {} retries",
                        MAX_RATE_LIMIT_RETRIES
                    )));
                }

                let wait_duration = retry_after.unwrap_or(Duration::from_secs(1));
                debug!(
                    "Telegram rate limited (429), waiting {:?} before retry (attempt {}/{})",
                    wait_duration, attempts, MAX_RATE_LIMIT_RETRIES
                );
                tokio::time::sleep(wait_duration).await;
                continue;
            }

            debug!("Telegram {} failed: {} - {}", method, status, body.description);
            return Err(classify_failure(status.as_u16(), &body.description));
        }
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        action: Option<&InlineAction>,
    ) -> Result<(), SendError> {
        let mut payload = json!({
            "chat_id": chat_id,
            "text": truncate_message(text, TELEGRAM_MESSAGE_LIMIT),
        });
        if let Some(action) = action {
            payload["reply_markup"] = reply_markup(action);
        }

        self.send_with_retry("sendMessage", |request| request.json(&payload))
            .await
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        photo: Bytes,
        caption: &str,
        action: Option<&InlineAction>,
    ) -> Result<(), SendError> {
        let caption = truncate_message(caption, TELEGRAM_CAPTION_LIMIT);
        let markup = action.map(|a| reply_markup(a).to_string());

        self.send_with_retry("sendPhoto", |request| {
            let part = Part::bytes(photo.to_vec()).file_name("poster.jpg");
            let mut form = Form::new()
                .text("chat_id", chat_id.to_string())
                .text("caption", caption.clone())
                .part("photo", part);
            if let Some(markup) = &markup {
                form = form.text("reply_markup", markup.clone());
            }
            request.multipart(form)
        })
        .await
    }
}

fn reply_markup(action: &InlineAction) -> serde_json::Value {
    json!({
        "inline_keyboard": [[{
            "text": action.label,
            "callback_data": action.callback_data,
        }]]
    })
}

/// Map a failed Bot API response onto a [`SendError`].
///
/// Blocked bots, deactivated users and vanished chats are permanent; so is
/// any 403. Everything else is transient.
pub fn classify_failure(status: u16, description: &str) -> SendError {
    let lowered = description.to_ascii_lowercase();
    let message = format!("Telegram API error {}: {}", status, description);

    if status == 403
        || lowered.contains("blocked")
        || lowered.contains("user is deactivated")
        || lowered.contains("chat not found")
    {
        SendError::RecipientUnreachable(message)
    } else {
        SendError::Transient(message)
    }
}

/// Truncate a message to fit within a Telegram character limit.
pub fn truncate_message(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let suffix = "\n\n[truncated]";
    let budget = limit - suffix.len();
    let truncated: String = text.chars().take(budget).collect();
    format!("{truncated}{suffix}")
}
