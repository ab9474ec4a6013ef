//! Sequential, rate-limited fan-out of one notification.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::format::{format_notification, mute_action};
use super::selection::select_recipients;
use super::transport::{ChatTransport, SendError};
use crate::config::SelectionConfig;
use crate::database::repositories::{MutedSeriesRepository, SubscriberRepository};
use crate::domain::NotificationPayload;
use crate::i18n::{Catalog, DEFAULT_LANGUAGE, detect_language};
use crate::media::MediaClient;
use crate::{Error, Result};

/// Default delay before each send, keeping under ~30 messages per second.
pub const DEFAULT_SEND_INTERVAL: Duration = Duration::from_millis(35);

/// Counters for one delivery loop run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    /// Recipients in the delivery set.
    pub selected: usize,
    pub sent: usize,
    /// Transient failures; the recipient stays active.
    pub failed: usize,
    /// Permanent failures; the recipient was deactivated.
    pub deactivated: usize,
    /// The loop stopped early because of shutdown.
    pub cancelled: bool,
}

impl DeliveryReport {
    /// Recipients the loop never got to.
    pub fn skipped(&self) -> usize {
        self.selected
            .saturating_sub(self.sent + self.failed + self.deactivated)
    }
}

/// Selects recipients for a payload and delivers it to them one at a time.
pub struct Broadcaster {
    subscribers: Arc<dyn SubscriberRepository>,
    mutes: Arc<dyn MutedSeriesRepository>,
    transport: Arc<dyn ChatTransport>,
    media: Arc<dyn MediaClient>,
    catalog: Arc<dyn Catalog>,
    selection: SelectionConfig,
    send_interval: Duration,
    default_language: String,
}

impl Broadcaster {
    pub fn new(
        subscribers: Arc<dyn SubscriberRepository>,
        mutes: Arc<dyn MutedSeriesRepository>,
        transport: Arc<dyn ChatTransport>,
        media: Arc<dyn MediaClient>,
        catalog: Arc<dyn Catalog>,
    ) -> Self {
        Self {
            subscribers,
            mutes,
            transport,
            media,
            catalog,
            selection: SelectionConfig::default(),
            send_interval: DEFAULT_SEND_INTERVAL,
            default_language: DEFAULT_LANGUAGE.to_string(),
        }
    }

    pub fn with_selection(mut self, selection: SelectionConfig) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_send_interval(mut self, interval: Duration) -> Self {
        self.send_interval = interval;
        self
    }

    pub fn with_default_language(mut self, language: &str) -> Self {
        self.default_language = detect_language(language).to_string();
        self
    }

    /// Select the recipients for `payload` and deliver to them.
    ///
    /// Fails only when the recipient registry cannot be read; per-recipient
    /// failures are counted in the report.
    pub async fn broadcast(
        &self,
        payload: &NotificationPayload,
        cancel: &CancellationToken,
    ) -> Result<DeliveryReport> {
        let subscribers = self
            .subscribers
            .list_active()
            .await
            .map_err(|e| Error::pipeline(format!("failed to list active subscribers: {e}")))?;

        let selection =
            select_recipients(payload, &subscribers, &self.selection, self.mutes.as_ref()).await;

        if selection.recipients.is_empty() {
            info!(
                item_id = %payload.content_id,
                total_subscribers = subscribers.len(),
                muted_count = selection.muted,
                "No subscribers to notify after filtering"
            );
            return Ok(DeliveryReport::default());
        }

        info!(
            item_id = %payload.content_id,
            content_type = %payload.content_type,
            title = %payload.title,
            subscriber_count = selection.recipients.len(),
            muted_count = selection.muted,
            "Broadcasting notification"
        );

        Ok(self.deliver(payload, &selection.recipients, cancel).await)
    }

    /// Deliver `payload` to each recipient in order.
    pub async fn deliver(
        &self,
        payload: &NotificationPayload,
        recipients: &[i64],
        cancel: &CancellationToken,
    ) -> DeliveryReport {
        let mut report = DeliveryReport {
            selected: recipients.len(),
            ..Default::default()
        };

        if recipients.is_empty() {
            return report;
        }

        let poster = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                report.cancelled = true;
                return report;
            }
            poster = self.fetch_poster(payload) => poster,
        };

        for &chat_id in recipients {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    report.cancelled = true;
                    break;
                }
                _ = tokio::time::sleep(self.send_interval) => {}
            }

            let lang = self.language_for(chat_id).await;
            let text = format_notification(self.catalog.as_ref(), &lang, payload);
            let action = mute_action(self.catalog.as_ref(), &lang, payload);

            let send = async {
                match &poster {
                    Some(photo) => {
                        self.transport
                            .send_photo(chat_id, photo.clone(), &text, action.as_ref())
                            .await
                    }
                    None => self.transport.send_text(chat_id, &text, action.as_ref()).await,
                }
            };

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    report.cancelled = true;
                    break;
                }
                result = send => result,
            };

            match result {
                Ok(()) => report.sent += 1,
                Err(SendError::RecipientUnreachable(reason)) => {
                    warn!(chat_id, error = %reason, "Recipient unreachable, marking inactive");
                    if let Err(e) = self.subscribers.set_active(chat_id, false).await {
                        error!(chat_id, error = %e, "Failed to mark subscriber as inactive");
                    }
                    report.deactivated += 1;
                }
                Err(SendError::Transient(reason)) => {
                    error!(chat_id, error = %reason, "Failed to send notification");
                    report.failed += 1;
                }
            }
        }

        info!(
            item_id = %payload.content_id,
            selected = report.selected,
            sent = report.sent,
            failed = report.failed,
            deactivated = report.deactivated,
            cancelled = report.cancelled,
            "Broadcast completed"
        );

        report
    }

    /// Fetch the poster once per broadcast; any failure means text-only.
    async fn fetch_poster(&self, payload: &NotificationPayload) -> Option<Bytes> {
        match self.media.fetch_poster(&payload.content_id).await {
            Ok(bytes) if !bytes.is_empty() => Some(bytes),
            Ok(_) => {
                debug!(item_id = %payload.content_id, "Poster image is empty, sending text only");
                None
            }
            Err(e) => {
                warn!(
                    item_id = %payload.content_id,
                    error = %e,
                    "Failed to fetch poster image for notification"
                );
                None
            }
        }
    }

    async fn language_for(&self, chat_id: i64) -> String {
        match self.subscribers.get_language(chat_id).await {
            Ok(Some(lang)) if !lang.is_empty() => lang,
            Ok(_) => self.default_language.clone(),
            Err(e) => {
                debug!(chat_id, error = %e, "Failed to load language preference, using default");
                self.default_language.clone()
            }
        }
    }
}
