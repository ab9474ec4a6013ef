//! The notification payload built once per admitted event.

use serde::{Deserialize, Serialize};

/// Placeholder title for items without a name.
pub const UNKNOWN_TITLE: &str = "Unknown";

/// Placeholder overview for items without a description.
pub const NO_DESCRIPTION: &str = "No description available";

/// Placeholder series name for episodes without one.
pub const UNKNOWN_SERIES: &str = "Unknown Series";

/// Item id prefix that marks synthetic test traffic.
pub const SYNTHETIC_ID_PREFIX: &str = "test-";

/// Kinds of media items that produce notifications.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
pub enum ContentType {
    Movie,
    Episode,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Movie => "Movie",
            Self::Episode => "Episode",
        }
    }
}

/// Immutable, event-derived content of one broadcast.
///
/// Placeholders are applied when the payload is built, so every rendering
/// sees the same text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub content_id: String,
    pub content_type: ContentType,
    pub title: String,
    pub overview: String,
    /// Release year, `0` when unknown.
    pub year: i32,
    /// Community rating, `0.0` when unknown.
    pub rating: f64,
    /// Series name; only set for episodes.
    pub series_name: Option<String>,
    pub season_number: i32,
    pub episode_number: i32,
}

impl NotificationPayload {
    /// Build a movie payload, applying placeholders to empty fields.
    pub fn movie(content_id: impl Into<String>, title: &str, overview: &str, year: i32) -> Self {
        Self {
            content_id: content_id.into(),
            content_type: ContentType::Movie,
            title: or_placeholder(title, UNKNOWN_TITLE),
            overview: or_placeholder(overview, NO_DESCRIPTION),
            year,
            rating: 0.0,
            series_name: None,
            season_number: 0,
            episode_number: 0,
        }
    }

    /// Build an episode payload, applying placeholders to empty fields.
    pub fn episode(
        content_id: impl Into<String>,
        title: &str,
        overview: &str,
        year: i32,
        series_name: &str,
        season_number: i32,
        episode_number: i32,
    ) -> Self {
        Self {
            content_id: content_id.into(),
            content_type: ContentType::Episode,
            title: or_placeholder(title, UNKNOWN_TITLE),
            overview: or_placeholder(overview, NO_DESCRIPTION),
            year,
            rating: 0.0,
            series_name: Some(or_placeholder(series_name, UNKNOWN_SERIES)),
            season_number,
            episode_number,
        }
    }

    /// Whether the item id marks synthetic test traffic.
    pub fn is_synthetic(&self) -> bool {
        self.content_id.starts_with(SYNTHETIC_ID_PREFIX)
    }

    /// Series key used by the mute filter. `None` for movies and empty names.
    pub fn mute_key(&self) -> Option<&str> {
        match (self.content_type, self.series_name.as_deref()) {
            (ContentType::Episode, Some(series)) if !series.is_empty() => Some(series),
            _ => None,
        }
    }

    /// Series name eligible for a "mute this series" action.
    ///
    /// Placeholder names never qualify.
    pub fn mutable_series(&self) -> Option<&str> {
        self.mute_key().filter(|series| *series != UNKNOWN_SERIES)
    }
}

fn or_placeholder(value: &str, placeholder: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        placeholder.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_placeholders_applied() {
        let payload = NotificationPayload::episode("1", "", "  ", 0, "", 1, 2);
        assert_eq!(payload.title, UNKNOWN_TITLE);
        assert_eq!(payload.overview, NO_DESCRIPTION);
        assert_eq!(payload.series_name.as_deref(), Some(UNKNOWN_SERIES));
    }

    #[test]
    fn test_mute_key_and_action() {
        let movie = NotificationPayload::movie("m", "Interstellar", "", 2014);
        assert_eq!(movie.mute_key(), None);
        assert_eq!(movie.mutable_series(), None);

        let placeholder = NotificationPayload::episode("e1", "Pilot", "", 0, "", 1, 1);
        assert_eq!(placeholder.mute_key(), Some(UNKNOWN_SERIES));
        assert_eq!(placeholder.mutable_series(), None);

        let real = NotificationPayload::episode("e2", "Pilot", "", 2008, "Breaking Bad", 1, 1);
        assert_eq!(real.mutable_series(), Some("Breaking Bad"));
    }

    #[test]
    fn test_synthetic_detection() {
        assert!(NotificationPayload::movie("test-123", "x", "", 0).is_synthetic());
        assert!(!NotificationPayload::movie("42", "x", "", 0).is_synthetic());
    }

    #[test]
    fn test_content_type_strings() {
        assert_eq!(ContentType::from_str("Episode").unwrap(), ContentType::Episode);
        assert!(ContentType::from_str("Series").is_err());
        assert_eq!(ContentType::Movie.to_string(), ContentType::Movie.as_str());
    }
}
