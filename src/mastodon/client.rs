// Mastodon REST client - token-authenticated reads over HTTP.
//
// A thin reqwest wrapper with a generic GET helper, like the XRPC client on
// the Bluesky side. Pagination walks the account timeline backwards with
// `max_id` until the count limit, the start of the time window, or the end
// of the timeline is reached.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::models::{Account, Status};
use super::traits::{FetchOptions, SourceClient};
use crate::models::SourcePost;

/// Mastodon caps statuses pages at 40.
const PAGE_SIZE: usize = 40;

const USER_AGENT: &str = "mastodon-to-bluesky/0.1";

pub struct MastodonClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
    /// Set by `authenticate`; the statuses endpoint is keyed by account id.
    account_id: RwLock<Option<String>>,
}

impl MastodonClient {
    /// Create a client for `instance` (with or without the `https://`).
    pub fn new(instance: &str, token: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: instance_base_url(instance),
            token: token.to_string(),
            account_id: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET an API path with the bearer token and deserialize the JSON reply.
    async fn api_get<T: DeserializeOwned>(&self, path: &str, params: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);

        debug!(path = path, "Mastodon GET request");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .query(params)
            .send()
            .await
            .with_context(|| format!("Mastodon request failed: {path}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Mastodon {path} returned {status}: {body}");
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to deserialize Mastodon {path} response"))
    }
}

#[async_trait]
impl SourceClient for MastodonClient {
    async fn authenticate(&self) -> Result<Account> {
        let account: Account = self
            .api_get("/api/v1/accounts/verify_credentials", &[])
            .await
            .context("Failed to verify Mastodon credentials")?;

        info!(account = account.acct, "Authenticated with Mastodon");
        *self.account_id.write().await = Some(account.id.clone());
        Ok(account)
    }

    async fn fetch_posts(&self, options: &FetchOptions) -> Result<Vec<SourcePost>> {
        let account_id = self
            .account_id
            .read()
            .await
            .clone()
            .context("Mastodon client is not authenticated")?;

        let path = format!("/api/v1/accounts/{account_id}/statuses");
        let page_size = options.limit.unwrap_or(PAGE_SIZE).clamp(1, PAGE_SIZE).to_string();
        let exclude_replies = (!options.include_replies).to_string();
        let exclude_reblogs = (!options.include_boosts).to_string();

        let mut posts = Vec::new();
        let mut max_id: Option<String> = None;

        'pages: loop {
            let mut params: Vec<(&str, &str)> = vec![
                ("limit", page_size.as_str()),
                ("exclude_replies", exclude_replies.as_str()),
                ("exclude_reblogs", exclude_reblogs.as_str()),
            ];
            if let Some(ref id) = max_id {
                params.push(("max_id", id.as_str()));
            }

            let page: Vec<Status> = self.api_get(&path, &params).await?;

            debug!(
                page_posts = page.len(),
                total_collected = posts.len(),
                "Fetched page of Mastodon statuses"
            );

            let Some(last) = page.last() else {
                break;
            };
            max_id = Some(last.id.clone());

            // Pages are newest-first, so the first status older than the
            // window means everything after it is too.
            for status in page {
                if options.window.until.is_some_and(|until| status.created_at > until) {
                    continue;
                }
                if options.window.since.is_some_and(|since| status.created_at < since) {
                    break 'pages;
                }
                posts.push(SourcePost::from(status));
                if options.limit.is_some_and(|limit| posts.len() >= limit) {
                    break 'pages;
                }
            }
        }

        info!(count = posts.len(), "Collected Mastodon posts");
        Ok(posts)
    }

    async fn download_media(&self, url: &str) -> Result<Vec<u8>> {
        debug!(url = url, "Downloading media");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to download media from {url}"))?;

        if !response.status().is_success() {
            let status = response.status();
            anyhow::bail!("Media download from {url} returned {status}");
        }

        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read media body from {url}"))?;
        Ok(bytes.to_vec())
    }
}

/// Normalize an instance name to a base URL: add a scheme if missing and
/// drop trailing slashes.
pub fn instance_base_url(instance: &str) -> String {
    let trimmed = instance.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}
