// Source collaborator trait - the seam between the pipeline and Mastodon.
//
// The transfer orchestrator only talks to this trait, so tests drive it with
// an in-memory fake and the CLI drives it with `MastodonClient`.

use anyhow::Result;
use async_trait::async_trait;

use super::models::Account;
use crate::models::{SourcePost, TimeWindow};

/// What to fetch from the source timeline.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Stop after this many matching posts. `None` fetches everything.
    pub limit: Option<usize>,
    pub window: TimeWindow,
    pub include_replies: bool,
    pub include_boosts: bool,
}

/// Read-only access to the account whose posts are being moved.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Verify credentials and return the authenticated account.
    async fn authenticate(&self) -> Result<Account>;

    /// Fetch the account's posts. Order is unspecified; callers re-sort.
    async fn fetch_posts(&self, options: &FetchOptions) -> Result<Vec<SourcePost>>;

    /// Download the raw bytes behind a media URL.
    async fn download_media(&self, url: &str) -> Result<Vec<u8>>;
}
