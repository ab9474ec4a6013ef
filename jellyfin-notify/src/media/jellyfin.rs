//! Jellyfin HTTP API client.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

use super::MediaClient;
use crate::config::JellyfinSettings;
use crate::{Error, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Fields requested for item listings.
const ITEM_FIELDS: &str = "Overview,CommunityRating,OfficialRating,ProductionYear";

/// A movie or episode as returned by `/Items`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MediaItem {
    #[serde(rename = "Id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "Type")]
    pub item_type: String,
    pub overview: Option<String>,
    pub community_rating: Option<f64>,
    pub official_rating: Option<String>,
    pub production_year: Option<i32>,
    pub series_name: Option<String>,
    #[serde(rename = "ParentIndexNumber")]
    pub season_number: Option<i32>,
    #[serde(rename = "IndexNumber")]
    pub episode_number: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ItemsResponse {
    #[serde(default)]
    items: Vec<MediaItem>,
}

/// Jellyfin client authenticated with an API key (`X-Emby-Token`).
pub struct JellyfinClient {
    server_url: String,
    api_key: String,
    client: Client,
}

impl JellyfinClient {
    pub fn new(settings: &JellyfinSettings) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            server_url: settings.server_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            client,
        })
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Response> {
        let url = format!("{}{}", self.server_url, path);
        let response = self
            .client
            .get(&url)
            .header("X-Emby-Token", &self.api_key)
            .header("Accept", "application/json")
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::config(
                "Jellyfin authentication failed: invalid API key",
            ));
        }
        if status == StatusCode::NOT_FOUND {
            return Err(Error::not_found("JellyfinResource", path));
        }
        if status.is_client_error() || status.is_server_error() {
            return Err(Error::Other(format!("Jellyfin HTTP error: {}", status)));
        }
        Ok(response)
    }

    async fn list_items(&self, query: &[(&str, String)]) -> Result<Vec<MediaItem>> {
        let response = self.get("/Items", query).await?;
        let body: ItemsResponse = response.json().await?;
        Ok(body.items)
    }
}

#[async_trait]
impl MediaClient for JellyfinClient {
    async fn fetch_poster(&self, content_id: &str) -> Result<Bytes> {
        let path = format!("/Items/{}/Images/Primary", content_id);
        let bytes = self.get(&path, &[]).await?.bytes().await?;
        debug!(item_id = %content_id, size = bytes.len(), "Fetched poster image");
        Ok(bytes)
    }

    async fn recent_items(&self, limit: usize) -> Result<Vec<MediaItem>> {
        self.list_items(&[
            ("Filters", "IsNotFolder".to_string()),
            ("Recursive", "true".to_string()),
            ("SortBy", "DateCreated".to_string()),
            ("SortOrder", "Descending".to_string()),
            ("IncludeItemTypes", "Movie,Episode".to_string()),
            ("Limit", limit.to_string()),
            ("Fields", ITEM_FIELDS.to_string()),
        ])
        .await
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<MediaItem>> {
        self.list_items(&[
            ("SearchTerm", query.to_string()),
            ("Recursive", "true".to_string()),
            ("IncludeItemTypes", "Movie,Episode".to_string()),
            ("Limit", limit.to_string()),
            ("Fields", ITEM_FIELDS.to_string()),
        ])
        .await
    }
}
