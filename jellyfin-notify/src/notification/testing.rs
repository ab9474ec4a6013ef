//! In-memory collaborators for broadcaster tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use super::delivery::Broadcaster;
use super::transport::{ChatTransport, InlineAction, SendError};
use crate::database::models::{MutedSeriesDbModel, SubscriberDbModel};
use crate::database::repositories::{MutedSeriesRepository, SubscriberRepository};
use crate::i18n::Catalog;
use crate::media::{MediaClient, MediaItem};
use crate::{Error, Result};

#[derive(Default)]
pub struct MemorySubscribers {
    rows: Mutex<Vec<SubscriberDbModel>>,
    failing_reads: AtomicBool,
    failing_writes: AtomicBool,
    list_calls: AtomicUsize,
}

impl MemorySubscribers {
    pub fn insert(&self, chat_id: i64, is_active: bool, language: Option<&str>) {
        self.rows.lock().unwrap().push(SubscriberDbModel {
            id: chat_id,
            chat_id,
            username: None,
            first_name: None,
            language_code: language.map(str::to_string),
            is_active,
            created_at: 0,
            updated_at: 0,
        });
    }

    pub fn is_active(&self, chat_id: i64) -> bool {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .any(|r| r.chat_id == chat_id && r.is_active)
    }

    pub fn fail_reads(&self) {
        self.failing_reads.store(true, Ordering::SeqCst);
    }

    pub fn heal_reads(&self) {
        self.failing_reads.store(false, Ordering::SeqCst);
    }

    pub fn fail_writes(&self) {
        self.failing_writes.store(true, Ordering::SeqCst);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubscriberRepository for MemorySubscribers {
    async fn add_subscriber(&self, chat_id: i64, _: Option<&str>, _: Option<&str>) -> Result<()> {
        self.insert(chat_id, true, None);
        Ok(())
    }

    async fn set_active(&self, chat_id: i64, active: bool) -> Result<()> {
        if self.failing_writes.load(Ordering::SeqCst) {
            return Err(Error::Other("database is locked".into()));
        }
        let mut rows = self.rows.lock().unwrap();
        match rows.iter_mut().find(|r| r.chat_id == chat_id) {
            Some(row) => {
                row.is_active = active;
                Ok(())
            }
            None => Err(Error::not_found("Subscriber", chat_id.to_string())),
        }
    }

    async fn list_active(&self) -> Result<Vec<SubscriberDbModel>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_reads.load(Ordering::SeqCst) {
            return Err(Error::Other("database is locked".into()));
        }
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.is_active)
            .cloned()
            .collect())
    }

    async fn is_subscribed(&self, chat_id: i64) -> Result<bool> {
        Ok(self.is_active(chat_id))
    }

    async fn set_language(&self, _: i64, _: &str) -> Result<()> {
        unimplemented!()
    }

    async fn get_language(&self, chat_id: i64) -> Result<Option<String>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.chat_id == chat_id)
            .and_then(|r| r.language_code.clone()))
    }
}

#[derive(Default)]
pub struct MemoryMutes {
    muted: Mutex<Vec<(i64, String)>>,
}

impl MemoryMutes {
    pub fn mute(&self, chat_id: i64, series: &str) {
        self.muted.lock().unwrap().push((chat_id, series.to_string()));
    }
}

#[async_trait]
impl MutedSeriesRepository for MemoryMutes {
    async fn add_muted_series(&self, chat_id: i64, series_id: &str, _: &str) -> Result<()> {
        self.mute(chat_id, series_id);
        Ok(())
    }

    async fn remove_muted_series(&self, _: i64, _: &str) -> Result<()> {
        unimplemented!()
    }

    async fn list_muted_series(&self, _: i64) -> Result<Vec<MutedSeriesDbModel>> {
        unimplemented!()
    }

    async fn is_muted(&self, chat_id: i64, series_id: &str) -> Result<bool> {
        Ok(self
            .muted
            .lock()
            .unwrap()
            .iter()
            .any(|(c, s)| *c == chat_id && s == series_id))
    }
}

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub chat_id: i64,
    pub text: String,
    pub photo: bool,
    pub callback_data: Option<String>,
}

#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<SentMessage>>,
    failures: Mutex<HashMap<i64, SendError>>,
}

impl RecordingTransport {
    pub fn fail(&self, chat_id: i64, error: SendError) {
        self.failures.lock().unwrap().insert(chat_id, error);
    }

    pub fn sends(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn recipients(&self) -> Vec<i64> {
        self.sends().iter().map(|s| s.chat_id).collect()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }

    fn record(
        &self,
        chat_id: i64,
        text: &str,
        photo: bool,
        action: Option<&InlineAction>,
    ) -> std::result::Result<(), SendError> {
        if let Some(err) = self.failures.lock().unwrap().get(&chat_id) {
            return Err(err.clone());
        }
        self.sent.lock().unwrap().push(SentMessage {
            chat_id,
            text: text.to_string(),
            photo,
            callback_data: action.map(|a| a.callback_data.clone()),
        });
        Ok(())
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        action: Option<&InlineAction>,
    ) -> std::result::Result<(), SendError> {
        self.record(chat_id, text, false, action)
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        _photo: Bytes,
        caption: &str,
        action: Option<&InlineAction>,
    ) -> std::result::Result<(), SendError> {
        self.record(chat_id, caption, true, action)
    }
}

#[derive(Default)]
pub struct StubMedia {
    poster: Mutex<Option<Bytes>>,
    calls: AtomicUsize,
}

impl StubMedia {
    pub fn set_poster(&self, poster: Option<Bytes>) {
        *self.poster.lock().unwrap() = poster;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaClient for StubMedia {
    async fn fetch_poster(&self, content_id: &str) -> Result<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.poster
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::not_found("Poster", content_id))
    }

    async fn recent_items(&self, _: usize) -> Result<Vec<MediaItem>> {
        Ok(Vec::new())
    }

    async fn search(&self, _: &str, _: usize) -> Result<Vec<MediaItem>> {
        Ok(Vec::new())
    }
}

/// Renders `[lang]key` so assertions can see which language was used.
pub struct KeyCatalog;

impl Catalog for KeyCatalog {
    fn render(&self, lang: &str, key: &str, _: &[(&str, &str)]) -> String {
        format!("[{lang}]{key}")
    }
}

pub struct Harness {
    pub subscribers: Arc<MemorySubscribers>,
    pub mutes: Arc<MemoryMutes>,
    pub transport: Arc<RecordingTransport>,
    pub media: Arc<StubMedia>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::default(),
            mutes: Arc::default(),
            transport: Arc::default(),
            media: Arc::default(),
        }
    }

    pub fn broadcaster(&self) -> Broadcaster {
        Broadcaster::new(
            self.subscribers.clone(),
            self.mutes.clone(),
            self.transport.clone(),
            self.media.clone(),
            Arc::new(KeyCatalog),
        )
        .with_send_interval(Duration::ZERO)
    }
}
