//! jellyfin-notify library crate.
//!
//! Relays Jellyfin "item added" webhooks to Telegram subscribers. The binary
//! wires these modules together; integration tests drive them directly.

rust_i18n::i18n!("locales", fallback = "en");

pub mod api;
pub mod config;
pub mod database;
pub mod domain;
pub mod error;
pub mod i18n;
pub mod ingest;
pub mod logging;
pub mod media;
pub mod notification;

pub use error::{Error, Result};
