// Raw Mastodon REST API records and their conversion into pipeline models.
//
// Only the fields the transfer needs are declared; serde ignores the rest.
// API docs: https://docs.joinmastodon.org/entities/Status/

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::models::{AspectRatio, MediaAttachment, MediaKind, SourcePost, Visibility};

/// Response from `GET /api/v1/accounts/verify_credentials`.
#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub id: String,
    pub username: String,
    pub acct: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub statuses_count: u64,
}

/// One entry from `GET /api/v1/accounts/:id/statuses`.
#[derive(Debug, Clone, Deserialize)]
pub struct Status {
    pub id: String,
    #[serde(default)]
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub url: Option<String>,
    pub in_reply_to_id: Option<String>,
    pub reblog: Option<Box<Status>>,
    #[serde(default)]
    pub media_attachments: Vec<ApiMediaAttachment>,
    #[serde(default)]
    pub spoiler_text: String,
    #[serde(default)]
    pub visibility: Visibility,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiMediaAttachment {
    #[serde(rename = "type")]
    pub kind: MediaKind,
    /// Null while the server is still processing the upload.
    pub url: Option<String>,
    pub remote_url: Option<String>,
    pub description: Option<String>,
    pub meta: Option<MediaMeta>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaMeta {
    pub original: Option<MediaDimensions>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaDimensions {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl ApiMediaAttachment {
    /// Convert to a pipeline attachment. Attachments without any fetchable
    /// URL are dropped.
    fn into_attachment(self) -> Option<MediaAttachment> {
        let url = self.url.or(self.remote_url)?;
        let aspect_ratio = self
            .meta
            .and_then(|m| m.original)
            .and_then(|d| match (d.width, d.height) {
                (Some(width), Some(height)) if width > 0 && height > 0 => {
                    Some(AspectRatio { width, height })
                }
                _ => None,
            });
        Some(MediaAttachment {
            kind: self.kind,
            url,
            description: self.description.filter(|d| !d.trim().is_empty()),
            aspect_ratio,
        })
    }
}

impl From<Status> for SourcePost {
    /// A boost carries no content of its own: body, media, content warning
    /// and language come from the boosted status, while id, timestamp and
    /// visibility stay those of the boost itself.
    fn from(mut status: Status) -> Self {
        let mut boost_of = None;
        let (content, media, spoiler_text, language) = match status.reblog.take() {
            Some(inner) => {
                boost_of = Some(inner.url.clone().unwrap_or_else(|| inner.id.clone()));
                (
                    inner.content,
                    inner.media_attachments,
                    inner.spoiler_text,
                    inner.language,
                )
            }
            None => (
                status.content,
                status.media_attachments,
                status.spoiler_text,
                status.language,
            ),
        };

        SourcePost {
            id: status.id,
            content,
            created_at: status.created_at,
            url: status.url,
            in_reply_to_id: status.in_reply_to_id,
            boost_of,
            media: media
                .into_iter()
                .filter_map(ApiMediaAttachment::into_attachment)
                .collect(),
            spoiler_text,
            visibility: status.visibility,
            language,
        }
    }
}
