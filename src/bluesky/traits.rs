// Destination collaborator trait - the seam between the pipeline and Bluesky.
//
// Submission order matters: every post after the first in a thread needs
// the PostRef of its predecessor, so callers await each `create_post`
// before issuing the next.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{BlobRef, DestinationPostRequest, Facet, PostRef};

/// An authenticated destination account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub did: String,
    pub handle: String,
}

#[async_trait]
pub trait DestinationClient: Send + Sync {
    /// Log in and return the session identity.
    async fn authenticate(&self) -> Result<Session>;

    /// Compute the final text and rich-text facets for a chunk of text.
    async fn tokenize_rich_text(&self, text: &str) -> Result<(String, Vec<Facet>)>;

    /// Upload image bytes and return the blob reference to embed.
    async fn upload_image(&self, data: &[u8]) -> Result<BlobRef>;

    /// Create one post record.
    async fn create_post(&self, post: &DestinationPostRequest) -> Result<PostRef>;
}
