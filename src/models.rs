// Data models - the typed records that flow through the transfer pipeline.
//
// These are separate from the two API clients so the pipeline can use them
// without depending on reqwest or the wire formats. Only the blob reference
// stays an opaque JSON value: the destination hands it back and we pass it
// through untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who can see a source post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Unlisted,
    Private,
    Direct,
    /// Anything a server or fork adds beyond the four standard values,
    /// e.g. local-only posts.
    #[serde(other)]
    Other,
}

impl Visibility {
    /// Whether a post with this audience may be republished.
    pub fn is_publishable(self) -> bool {
        !matches!(self, Visibility::Direct | Visibility::Other)
    }
}

/// Media type tag as reported by the source service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Gifv,
    Video,
    Audio,
    #[serde(other)]
    Unknown,
}

/// Width/height pair, carried over so the destination can lay images out
/// before they load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

/// One media reference on a source post.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaAttachment {
    pub kind: MediaKind,
    pub url: String,
    pub description: Option<String>,
    pub aspect_ratio: Option<AspectRatio>,
}

impl MediaAttachment {
    pub fn is_image(&self) -> bool {
        self.kind == MediaKind::Image
    }
}

/// Immutable snapshot of one Mastodon post.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcePost {
    pub id: String,
    /// HTML body as served by the source.
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub url: Option<String>,
    pub in_reply_to_id: Option<String>,
    /// Set when this post is a boost; holds the boosted post's URL or id.
    pub boost_of: Option<String>,
    pub media: Vec<MediaAttachment>,
    /// Content warning, empty when the post has none.
    pub spoiler_text: String,
    pub visibility: Visibility,
    pub language: Option<String>,
}

impl SourcePost {
    pub fn is_reply(&self) -> bool {
        self.in_reply_to_id.is_some()
    }

    pub fn is_boost(&self) -> bool {
        self.boost_of.is_some()
    }

    /// The content warning, if it has any visible text.
    pub fn content_warning(&self) -> Option<&str> {
        let cw = self.spoiler_text.trim();
        (!cw.is_empty()).then_some(cw)
    }
}

/// Reference to a created destination record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRef {
    pub uri: String,
    pub cid: String,
}

/// Thread linkage for a reply: the first post of the thread and the post
/// being answered directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRef {
    pub root: PostRef,
    pub parent: PostRef,
}

/// Opaque blob reference returned by an upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobRef(pub serde_json::Value);

/// UTF-8 byte range a facet applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteSlice {
    #[serde(rename = "byteStart")]
    pub byte_start: usize,
    #[serde(rename = "byteEnd")]
    pub byte_end: usize,
}

/// What a facet span means.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "$type")]
pub enum FacetFeature {
    #[serde(rename = "app.bsky.richtext.facet#link")]
    Link { uri: String },
    #[serde(rename = "app.bsky.richtext.facet#mention")]
    Mention { did: String },
    #[serde(rename = "app.bsky.richtext.facet#tag")]
    Tag { tag: String },
}

/// A rich-text annotation on a destination post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facet {
    pub index: ByteSlice,
    pub features: Vec<FacetFeature>,
}

/// One uploaded image inside an embed.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbedImage {
    pub image: BlobRef,
    pub alt: Option<String>,
    pub aspect_ratio: Option<AspectRatio>,
}

/// Image embed for the first post of a thread. Never constructed empty:
/// "no images" is represented as `Option::<ImageEmbed>::None`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageEmbed {
    pub images: Vec<EmbedImage>,
}

/// One unit submitted to the destination.
#[derive(Debug, Clone, PartialEq)]
pub struct DestinationPostRequest {
    pub text: String,
    /// Creation time of the source post, not of the submission.
    pub created_at: DateTime<Utc>,
    pub facets: Vec<Facet>,
    pub embed: Option<ImageEmbed>,
    pub reply: Option<ReplyRef>,
    pub langs: Vec<String>,
}

/// Aggregate counts for one transfer run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransferStats {
    pub processed: usize,
    pub transferred: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// Inclusive creation-time window. Open on a side when that bound is `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.since.map_or(true, |since| at >= since) && self.until.map_or(true, |until| at <= until)
    }
}
