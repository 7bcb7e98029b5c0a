//! Clip records as returned by the collector's list endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One uploaded clip. Owned by the server; voxclip only reads these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioRecord {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Server-relative path, e.g. `uploads/1700000000.webm`
    #[serde(rename = "filePath", default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    /// Absolute playback URL (some deployments return this instead of `filePath`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl AudioRecord {
    /// Resolves a playable URL for this clip.
    ///
    /// An absolute `url` wins. Otherwise `filePath` is joined onto `media_origin`.
    /// Returns `None` when the record carries neither.
    pub fn playback_url(&self, media_origin: &str) -> Option<String> {
        if let Some(url) = self.url.as_deref().filter(|u| is_absolute(u)) {
            return Some(url.to_string());
        }

        let path = self
            .file_path
            .as_deref()
            .or(self.url.as_deref())
            .filter(|p| !p.trim().is_empty())?;
        let path = path.replace('\\', "/");

        Some(format!(
            "{}/{}",
            media_origin.trim_end_matches('/'),
            path.trim_start_matches('/')
        ))
    }
}

fn is_absolute(url: &str) -> bool {
    reqwest::Url::parse(url)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}
