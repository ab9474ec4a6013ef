//! Inbound Jellyfin webhook body: tolerant parsing and text cleanup.

use regex::Regex;
use serde::{Deserialize, Deserializer};
use std::borrow::Cow;
use std::sync::LazyLock;

use crate::domain::{ContentType, NotificationPayload};
use crate::{Error, Result};

/// Notification type emitted by the webhook plugin for new library items.
pub const ITEM_ADDED: &str = "ItemAdded";

/// `"Key": ,` / `"Key": }` / `"Key": ]`: a key whose value was left empty by the template.
static MISSING_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""(\w+)":\s*([,}\]])"#).unwrap());

/// `"Key": 007`: zero-padded numerals, which are not valid JSON.
static LEADING_ZEROS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""(\w+)":\s*0+(\d+)"#).unwrap());

/// Repair the malformed numeric fields the webhook templates are known to emit.
pub fn normalize_raw_json(raw: &str) -> Cow<'_, str> {
    let fixed = MISSING_VALUE.replace_all(raw, "\"$1\": 0$2");
    if !LEADING_ZEROS.is_match(&fixed) {
        return fixed;
    }
    Cow::Owned(LEADING_ZEROS.replace_all(&fixed, "\"$1\": $2").into_owned())
}

/// Decode the HTML entities the media server uses for non-ASCII text.
///
/// Handles the common named entities plus decimal (`&#1605;`) and hex
/// (`&#x645;`) character references. Unknown entities are left as-is.
pub fn decode_html_entities(input: &str) -> Cow<'_, str> {
    if !input.contains('&') {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];

        let decoded = tail
            .find(';')
            .filter(|&end| end <= 10)
            .and_then(|end| decode_entity(&tail[1..end]).map(|c| (c, end)));

        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);

    Cow::Owned(out)
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let code = entity.strip_prefix('#')?;
            let value = match code.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse::<u32>().ok()?,
            };
            char::from_u32(value)
        }
    }
}

/// Accepts a JSON number, a numeric string, an empty string or null.
fn lenient_i32<'de, D>(deserializer: D) -> std::result::Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
        Str(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        None => 0,
        Some(Raw::Int(v)) => i32::try_from(v).unwrap_or(0),
        Some(Raw::Float(v)) => v as i32,
        Some(Raw::Str(s)) => s.trim().parse::<i32>().unwrap_or(0),
    })
}

fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(f64),
        Str(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        None => 0.0,
        Some(Raw::Num(v)) => v,
        Some(Raw::Str(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
    })
}

/// Webhook body as sent by the Jellyfin webhook plugin.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct JellyfinWebhook {
    pub notification_type: String,
    pub item_type: String,
    #[serde(rename = "ItemId")]
    pub item_id: String,
    pub item_name: String,
    pub overview: String,
    #[serde(deserialize_with = "lenient_i32")]
    pub year: i32,
    #[serde(deserialize_with = "lenient_f64")]
    pub community_rating: f64,
    pub series_name: String,
    #[serde(deserialize_with = "lenient_i32")]
    pub season_number: i32,
    #[serde(deserialize_with = "lenient_i32")]
    pub episode_number: i32,

    #[serde(rename = "ServerId")]
    pub server_id: String,
    pub server_name: String,
    pub server_version: String,
}

impl JellyfinWebhook {
    /// Parse a raw request body, repairing malformed numerics and decoding entities.
    pub fn parse(body: &[u8]) -> Result<Self> {
        let raw = String::from_utf8_lossy(body);
        let normalized = normalize_raw_json(&raw);

        let mut webhook: Self = serde_json::from_str(&normalized)
            .map_err(|e| Error::validation(format!("Invalid JSON payload: {}", e)))?;
        webhook.decode_entities();
        Ok(webhook)
    }

    fn decode_entities(&mut self) {
        for field in [&mut self.item_name, &mut self.overview, &mut self.series_name] {
            if field.contains('&') {
                *field = decode_html_entities(field).into_owned();
            }
        }
    }

    pub fn is_item_added(&self) -> bool {
        self.notification_type == ITEM_ADDED
    }

    /// Content type for supported item types.
    pub fn content_type(&self) -> Option<ContentType> {
        match self.item_type.as_str() {
            "Movie" => Some(ContentType::Movie),
            "Episode" => Some(ContentType::Episode),
            _ => None,
        }
    }

    /// Build the notification payload with placeholders applied.
    pub fn to_payload(&self, content_type: ContentType) -> NotificationPayload {
        let mut payload = match content_type {
            ContentType::Movie => {
                NotificationPayload::movie(&self.item_id, &self.item_name, &self.overview, self.year)
            }
            ContentType::Episode => NotificationPayload::episode(
                &self.item_id,
                &self.item_name,
                &self.overview,
                self.year,
                &self.series_name,
                self.season_number,
                self.episode_number,
            ),
        };
        payload.rating = self.community_rating.max(0.0);
        payload
    }
}
