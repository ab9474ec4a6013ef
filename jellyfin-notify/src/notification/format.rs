//! Per-recipient rendering of a notification payload.

use crate::domain::{ContentType, NotificationPayload};
use crate::i18n::Catalog;

use super::transport::InlineAction;

/// Callback data prefix understood by the mute callback handler.
pub const MUTE_CALLBACK_PREFIX: &str = "mute:";

/// Bot API limit on `callback_data`, in bytes.
const CALLBACK_DATA_LIMIT: usize = 64;

/// Render the notification text in `lang`.
pub fn format_notification(catalog: &dyn Catalog, lang: &str, payload: &NotificationPayload) -> String {
    let mut message = String::new();

    match payload.content_type {
        ContentType::Movie => {
            message.push_str(&catalog.render(lang, "notification.movie.header", &[]));
            message.push_str("\n\n");
            message.push_str(&catalog.render(lang, "content.field.name", &[("name", payload.title.as_str())]));

            if payload.year > 0 {
                let year = payload.year.to_string();
                message.push('\n');
                message.push_str(&catalog.render(lang, "content.field.year", &[("year", year.as_str())]));
            }
        }
        ContentType::Episode => {
            message.push_str(&catalog.render(lang, "notification.episode.header", &[]));
            message.push_str("\n\n");

            let series = payload
                .series_name
                .as_deref()
                .filter(|s| !s.is_empty())
                .unwrap_or(payload.title.as_str());
            message.push_str(&catalog.render(lang, "content.field.series", &[("series_name", series)]));
            message.push('\n');

            let season = format!("{:02}", payload.season_number);
            let episode = format!("{:02}", payload.episode_number);
            message.push_str(&catalog.render(
                lang,
                "content.field.episode_number",
                &[("season", season.as_str()), ("episode", episode.as_str())],
            ));

            if payload.series_name.as_deref().is_some_and(|s| !s.is_empty()) {
                message.push('\n');
                message.push_str(&catalog.render(
                    lang,
                    "content.field.episode_name",
                    &[("name", payload.title.as_str())],
                ));
            }
        }
    }

    if !payload.overview.is_empty() {
        message.push_str("\n\n");
        message.push_str(&catalog.render(
            lang,
            "content.field.description",
            &[("description", payload.overview.as_str())],
        ));
    }

    if payload.rating > 0.0 {
        let rating = format!("{:.1}", payload.rating);
        message.push_str("\n\n");
        message.push_str(&catalog.render(lang, "content.field.rating", &[("rating", rating.as_str())]));
    }

    message
}

/// The "mute this series" button, for episodes of a real (non-placeholder) series.
pub fn mute_action(catalog: &dyn Catalog, lang: &str, payload: &NotificationPayload) -> Option<InlineAction> {
    let series = payload.mutable_series()?;
    let data = format!("{MUTE_CALLBACK_PREFIX}{series}");

    Some(InlineAction {
        label: catalog.render(lang, "button.mute", &[]),
        callback_data: truncate_bytes(&data, CALLBACK_DATA_LIMIT).to_string(),
    })
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a character.
fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
