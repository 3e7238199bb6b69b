// Transfer orchestrator: fetch -> filter -> per post (convert, submit,
// commit) -> report.
//
// Posts are handled one at a time, oldest first. A post that fails is
// counted and reported but never aborts the run; since its id is not
// committed, the next run picks it up again. Only fetching the candidate
// list is fatal.

use anyhow::{Context, Result};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use super::media::{resolve_media, select_images};
use super::normalize::normalize;
use super::segment::{split_text, MAX_POST_LENGTH};
use super::state::StateStore;
use super::thread::{prepare_thread, publish_thread};
use crate::bluesky::traits::DestinationClient;
use crate::mastodon::traits::{FetchOptions, SourceClient};
use crate::models::{SourcePost, TimeWindow, TransferStats};
use crate::output::terminal;

/// Knobs for one transfer run.
#[derive(Debug, Clone)]
pub struct TransferOptions {
    /// Only consider the newest `limit` matching posts.
    pub limit: Option<usize>,
    pub window: TimeWindow,
    /// Skip posts already recorded in the state store.
    pub skip_existing: bool,
    pub include_replies: bool,
    pub include_boosts: bool,
    /// Report what would be sent without writing anything anywhere.
    pub dry_run: bool,
    /// Draw a progress bar (off for tests and non-interactive use).
    pub show_progress: bool,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            limit: None,
            window: TimeWindow::default(),
            skip_existing: true,
            include_replies: false,
            include_boosts: false,
            dry_run: false,
            show_progress: false,
        }
    }
}

/// What happened to a single source post.
#[derive(Debug)]
pub enum PostOutcome {
    /// Published as a thread of `posts` destination posts and committed.
    Transferred { posts: usize },
    /// Dry run: would have been transferred.
    Previewed,
    /// Already transferred by an earlier run.
    Skipped,
    Failed(anyhow::Error),
}

impl TransferStats {
    /// Fold one post's outcome into the running totals.
    pub fn absorb(mut self, outcome: &PostOutcome) -> Self {
        self.processed += 1;
        match outcome {
            PostOutcome::Transferred { .. } | PostOutcome::Previewed => self.transferred += 1,
            PostOutcome::Skipped => self.skipped += 1,
            PostOutcome::Failed(_) => self.errors += 1,
        }
        self
    }
}

pub struct Transfer<'a> {
    source: &'a dyn SourceClient,
    dest: &'a dyn DestinationClient,
    store: &'a mut StateStore,
}

impl<'a> Transfer<'a> {
    pub fn new(
        source: &'a dyn SourceClient,
        dest: &'a dyn DestinationClient,
        store: &'a mut StateStore,
    ) -> Self {
        Self {
            source,
            dest,
            store,
        }
    }

    /// Run one transfer and return the aggregate counts.
    pub async fn run(&mut self, options: &TransferOptions) -> Result<TransferStats> {
        info!("Fetching posts from Mastodon");

        let fetched = self
            .source
            .fetch_posts(&FetchOptions {
                limit: options.limit,
                window: options.window,
                include_replies: options.include_replies,
                include_boosts: options.include_boosts,
            })
            .await
            .context("Failed to fetch posts from Mastodon")?;

        let posts = select_posts(fetched, options);
        if posts.is_empty() {
            info!("No posts found matching criteria");
            return Ok(TransferStats::default());
        }

        info!(count = posts.len(), dry_run = options.dry_run, "Processing posts oldest-first");

        let pb = progress_bar(posts.len(), options.show_progress);
        let mut stats = TransferStats::default();

        for post in &posts {
            let outcome = self.process(post, options, &pb).await;

            match &outcome {
                PostOutcome::Transferred { posts: thread_len } => {
                    info!(id = post.id, posts = *thread_len, "Transferred post");
                }
                PostOutcome::Failed(e) => {
                    warn!(id = post.id, error = %format!("{e:#}"), "Failed to transfer post");
                    pb.suspend(|| terminal::display_post_error(&post.id, e));
                }
                PostOutcome::Previewed | PostOutcome::Skipped => {}
            }

            stats = stats.absorb(&outcome);
            pb.inc(1);
        }
        pb.finish_and_clear();

        info!(
            processed = stats.processed,
            transferred = stats.transferred,
            skipped = stats.skipped,
            errors = stats.errors,
            "Transfer run complete"
        );

        Ok(stats)
    }

    async fn process(
        &mut self,
        post: &SourcePost,
        options: &TransferOptions,
        pb: &ProgressBar,
    ) -> PostOutcome {
        if options.skip_existing && self.store.contains(&post.id) {
            debug!(id = post.id, "Already transferred, skipping");
            return PostOutcome::Skipped;
        }

        match self.convert_and_submit(post, options, pb).await {
            Ok(outcome) => outcome,
            Err(e) => PostOutcome::Failed(e),
        }
    }

    async fn convert_and_submit(
        &mut self,
        post: &SourcePost,
        options: &TransferOptions,
        pb: &ProgressBar,
    ) -> Result<PostOutcome> {
        let text = normalize(&post.content, post.content_warning());
        let chunks = split_text(&text, MAX_POST_LENGTH);

        if options.dry_run {
            let image_count = select_images(&post.media).count();
            pb.suspend(|| terminal::display_preview(post, &chunks, image_count));
            return Ok(PostOutcome::Previewed);
        }

        let embed = resolve_media(self.source, self.dest, &post.media).await?;
        let requests = prepare_thread(self.dest, &chunks, embed, post).await?;
        let refs = publish_thread(self.dest, requests).await?;

        self.store
            .record(&post.id, Utc::now())
            .context("Failed to save transfer state")?;

        debug!(
            id = post.id,
            uri = refs.first().map(|r| r.uri.as_str()).unwrap_or_default(),
            "Thread root created"
        );

        Ok(PostOutcome::Transferred { posts: refs.len() })
    }
}

/// Apply the reply/boost/visibility/window filters and the count limit,
/// then order oldest-first.
///
/// The limit keeps the newest posts, matching how the source timeline is
/// paged. Direct messages and posts with an unrecognised audience are
/// never published.
pub fn select_posts(posts: Vec<SourcePost>, options: &TransferOptions) -> Vec<SourcePost> {
    let mut selected: Vec<SourcePost> = posts
        .into_iter()
        .filter(|p| options.include_replies || !p.is_reply())
        .filter(|p| options.include_boosts || !p.is_boost())
        .filter(|p| p.visibility.is_publishable())
        .filter(|p| options.window.contains(p.created_at))
        .collect();

    selected.sort_by_key(|p| p.created_at);
    if let Some(limit) = options.limit {
        let excess = selected.len().saturating_sub(limit);
        selected.drain(..excess);
    }
    selected
}

fn progress_bar(len: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  Transferring [{bar:30}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb
}
