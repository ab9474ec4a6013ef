//! Ingestion gate: validates and deduplicates inbound events.
//!
//! The gate is the only writer of the content ledger. An item id is recorded
//! *before* its broadcast is handed off, so redelivery of the same webhook can
//! at worst lose one notification and never duplicate it.

pub mod webhook;

use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::Result;
use crate::database::repositories::ContentLedger;
use crate::domain::NotificationPayload;

pub use webhook::JellyfinWebhook;

/// Asynchronous handoff of an admitted event to the broadcast engine.
///
/// `dispatch` must not wait for delivery.
pub trait BroadcastDispatcher: Send + Sync {
    fn dispatch(&self, payload: NotificationPayload) -> Result<()>;
}

/// Why a well-formed event was not actionable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Not an "item added" notification.
    NotItemAdded(String),
    /// Item type other than Movie or Episode.
    UnsupportedItemType(String),
    MissingItemId,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotItemAdded(kind) => write!(f, "notification type {kind:?} is not ItemAdded"),
            Self::UnsupportedItemType(kind) => write!(f, "item type {kind:?} is not supported"),
            Self::MissingItemId => f.write_str("item id is missing"),
        }
    }
}

/// Result of admitting one event.
#[derive(Debug, Clone, PartialEq)]
pub enum AdmitOutcome {
    /// First sighting; the payload has been handed to the broadcaster.
    Accepted(NotificationPayload),
    /// Already announced; nothing was done.
    Duplicate,
    /// Well-formed but not actionable; nothing was done.
    Rejected(RejectReason),
}

impl AdmitOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted(_) => "accepted",
            Self::Duplicate => "duplicate",
            Self::Rejected(_) => "ignored",
        }
    }
}

/// Validates, deduplicates and hands off inbound events.
#[derive(Clone)]
pub struct IngestionGate {
    ledger: Arc<dyn ContentLedger>,
    dispatcher: Arc<dyn BroadcastDispatcher>,
}

impl IngestionGate {
    pub fn new(ledger: Arc<dyn ContentLedger>, dispatcher: Arc<dyn BroadcastDispatcher>) -> Self {
        Self { ledger, dispatcher }
    }

    /// Parse a raw webhook body and admit it.
    ///
    /// Returns [`Error::Validation`](crate::Error::Validation) for unparseable
    /// bodies and storage errors from the ledger; every other case is an
    /// [`AdmitOutcome`].
    pub async fn admit_raw(&self, body: &[u8]) -> Result<AdmitOutcome> {
        let webhook = JellyfinWebhook::parse(body)?;
        self.admit(&webhook).await
    }

    /// Admit an already parsed webhook.
    pub async fn admit(&self, webhook: &JellyfinWebhook) -> Result<AdmitOutcome> {
        info!(
            notification_type = %webhook.notification_type,
            item_type = %webhook.item_type,
            item_id = %webhook.item_id,
            item_name = %webhook.item_name,
            "Received webhook"
        );

        let content_type = match Self::validate(webhook) {
            Ok(content_type) => content_type,
            Err(reason) => {
                debug!(item_id = %webhook.item_id, reason = %reason, "Webhook ignored");
                return Ok(AdmitOutcome::Rejected(reason));
            }
        };

        if self.ledger.exists(&webhook.item_id).await? {
            info!(item_id = %webhook.item_id, "Content already notified, skipping");
            return Ok(AdmitOutcome::Duplicate);
        }

        let payload = webhook.to_payload(content_type);

        match self
            .ledger
            .insert(&payload.content_id, &payload.title, content_type)
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_unique_violation() => {
                info!(item_id = %payload.content_id, "Content recorded concurrently, skipping");
                return Ok(AdmitOutcome::Duplicate);
            }
            Err(e) => return Err(e),
        }

        info!(
            item_id = %payload.content_id,
            content_type = %content_type,
            title = %payload.title,
            synthetic = payload.is_synthetic(),
            "New content recorded, dispatching broadcast"
        );

        if let Err(e) = self.dispatcher.dispatch(payload.clone()) {
            // The ledger row stays; this event's broadcast is lost.
            error!(item_id = %payload.content_id, error = %e, "Failed to dispatch broadcast");
        }

        Ok(AdmitOutcome::Accepted(payload))
    }

    fn validate(webhook: &JellyfinWebhook) -> std::result::Result<crate::domain::ContentType, RejectReason> {
        if !webhook.is_item_added() {
            return Err(RejectReason::NotItemAdded(webhook.notification_type.clone()));
        }
        let Some(content_type) = webhook.content_type() else {
            return Err(RejectReason::UnsupportedItemType(webhook.item_type.clone()));
        };
        if webhook.item_id.trim().is_empty() {
            warn!("ItemAdded webhook without an item id");
            return Err(RejectReason::MissingItemId);
        }
        Ok(content_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::database::models::ContentCacheDbModel;
    use crate::domain::ContentType;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockLedger {
        rows: Mutex<HashMap<String, (String, ContentType)>>,
        fail_exists: bool,
        fail_insert: bool,
        /// Report absent on `exists` but conflict on `insert`, like a lost race.
        race: bool,
    }

    #[async_trait]
    impl ContentLedger for MockLedger {
        async fn exists(&self, content_id: &str) -> Result<bool> {
            if self.fail_exists {
                return Err(Error::Other("disk I/O error".into()));
            }
            if self.race {
                return Ok(false);
            }
            Ok(self.rows.lock().unwrap().contains_key(content_id))
        }

        async fn insert(&self, content_id: &str, title: &str, content_type: ContentType) -> Result<()> {
            if self.fail_insert {
                return Err(Error::Other("disk full".into()));
            }
            let mut rows = self.rows.lock().unwrap();
            if self.race || rows.contains_key(content_id) {
                return Err(Error::already_exists("ContentCache", content_id));
            }
            rows.insert(content_id.to_string(), (title.to_string(), content_type));
            Ok(())
        }

        async fn get(&self, content_id: &str) -> Result<ContentCacheDbModel> {
            Err(Error::not_found("ContentCache", content_id))
        }
    }

    #[derive(Default)]
    struct RecordingDispatcher {
        dispatched: Mutex<Vec<NotificationPayload>>,
        fail: bool,
    }

    impl BroadcastDispatcher for RecordingDispatcher {
        fn dispatch(&self, payload: NotificationPayload) -> Result<()> {
            self.dispatched.lock().unwrap().push(payload);
            if self.fail {
                return Err(Error::Other("queue full".into()));
            }
            Ok(())
        }
    }

    fn gate(ledger: MockLedger, dispatcher: Arc<RecordingDispatcher>) -> (IngestionGate, Arc<MockLedger>) {
        let ledger = Arc::new(ledger);
        (IngestionGate::new(ledger.clone(), dispatcher), ledger)
    }

    fn movie_body(id: &str) -> Vec<u8> {
        format!(
            r#"{{"NotificationType":"ItemAdded","ItemType":"Movie","ItemId":"{id}","ItemName":"Interstellar","Year":2014}}"#
        )
        .into_bytes()
    }

    #[tokio::test]
    async fn test_admit_twice_is_duplicate() {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let (gate, ledger) = gate(MockLedger::default(), dispatcher.clone());

        let first = gate.admit_raw(&movie_body("42")).await.unwrap();
        let second = gate.admit_raw(&movie_body("42")).await.unwrap();

        assert!(matches!(first, AdmitOutcome::Accepted(ref p) if p.content_id == "42"));
        assert_eq!(second, AdmitOutcome::Duplicate);
        assert_eq!(dispatcher.dispatched.lock().unwrap().len(), 1);
        assert_eq!(ledger.rows.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rejects_non_actionable() {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let (gate, ledger) = gate(MockLedger::default(), dispatcher.clone());

        let outcome = gate
            .admit_raw(br#"{"NotificationType":"PlaybackStart","ItemType":"Movie","ItemId":"1"}"#)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            AdmitOutcome::Rejected(RejectReason::NotItemAdded("PlaybackStart".into()))
        );

        let outcome = gate
            .admit_raw(br#"{"NotificationType":"ItemAdded","ItemType":"Series","ItemId":"2"}"#)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            AdmitOutcome::Rejected(RejectReason::UnsupportedItemType("Series".into()))
        );

        let outcome = gate
            .admit_raw(br#"{"NotificationType":"ItemAdded","ItemType":"Movie"}"#)
            .await
            .unwrap();
        assert_eq!(outcome, AdmitOutcome::Rejected(RejectReason::MissingItemId));

        assert!(dispatcher.dispatched.lock().unwrap().is_empty());
        assert!(ledger.rows.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unparseable_body_is_validation_error() {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let (gate, _) = gate(MockLedger::default(), dispatcher);
        let err = gate.admit_raw(b"{broken").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_storage_errors_do_not_dispatch() {
        for ledger in [
            MockLedger {
                fail_exists: true,
                ..Default::default()
            },
            MockLedger {
                fail_insert: true,
                ..Default::default()
            },
        ] {
            let dispatcher = Arc::new(RecordingDispatcher::default());
            let (gate, _) = gate(ledger, dispatcher.clone());
            assert!(gate.admit_raw(&movie_body("7")).await.is_err());
            assert!(dispatcher.dispatched.lock().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_lost_insert_race_is_duplicate() {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let (gate, _) = gate(
            MockLedger {
                race: true,
                ..Default::default()
            },
            dispatcher.clone(),
        );
        let outcome = gate.admit_raw(&movie_body("9")).await.unwrap();
        assert_eq!(outcome, AdmitOutcome::Duplicate);
        assert!(dispatcher.dispatched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_failure_still_accepts() {
        let dispatcher = Arc::new(RecordingDispatcher {
            fail: true,
            ..Default::default()
        });
        let (gate, ledger) = gate(MockLedger::default(), dispatcher);
        let outcome = gate.admit_raw(&movie_body("11")).await.unwrap();
        assert!(matches!(outcome, AdmitOutcome::Accepted(_)));
        assert!(ledger.rows.lock().unwrap().contains_key("11"));
    }

    #[tokio::test]
    async fn test_episode_placeholders() {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let (gate, _) = gate(MockLedger::default(), dispatcher.clone());
        gate.admit_raw(br#"{"NotificationType":"ItemAdded","ItemType":"Episode","ItemId":"e1","SeasonNumber":02,"EpisodeNumber":}"#)
            .await
            .unwrap();

        let dispatched = dispatcher.dispatched.lock().unwrap();
        let payload = &dispatched[0];
        assert_eq!(payload.title, crate::domain::UNKNOWN_TITLE);
        assert_eq!(payload.overview, crate::domain::NO_DESCRIPTION);
        assert_eq!(payload.series_name.as_deref(), Some(crate::domain::UNKNOWN_SERIES));
        assert_eq!(payload.season_number, 2);
        assert_eq!(payload.episode_number, 0);
    }
}
