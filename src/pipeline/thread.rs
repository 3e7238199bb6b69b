// Thread builder: chunks + media -> a linked chain of Bluesky posts.
//
// Only the first post carries the images. Every post reuses the source
// post's timestamp. Posts after the first reply to the thread root and to
// their immediate predecessor, so submission is strictly sequential.

use anyhow::{Context, Result};
use tracing::debug;

use crate::bluesky::traits::DestinationClient;
use crate::models::{DestinationPostRequest, ImageEmbed, PostRef, ReplyRef, SourcePost};

/// Build one request per chunk, in chunk order. Reply linkage is left
/// empty: it is filled in by `publish_thread` as references come back.
pub async fn prepare_thread(
    dest: &dyn DestinationClient,
    chunks: &[String],
    embed: Option<ImageEmbed>,
    source: &SourcePost,
) -> Result<Vec<DestinationPostRequest>> {
    let langs: Vec<String> = source.language.iter().cloned().collect();
    let mut embed = embed;
    let mut requests = Vec::with_capacity(chunks.len());

    for chunk in chunks {
        let (text, facets) = dest
            .tokenize_rich_text(chunk)
            .await
            .context("Failed to build rich text")?;

        requests.push(DestinationPostRequest {
            text,
            created_at: source.created_at,
            facets,
            // take() leaves None behind, so only the first request gets it.
            embed: embed.take(),
            reply: None,
            langs: langs.clone(),
        });
    }

    Ok(requests)
}

/// Reply linkage for a post given the thread's root and the previous post.
/// The first post of a thread (no root yet) has none.
pub fn reply_link(root: Option<&PostRef>, parent: Option<&PostRef>) -> Option<ReplyRef> {
    match (root, parent) {
        (Some(root), Some(parent)) => Some(ReplyRef {
            root: root.clone(),
            parent: parent.clone(),
        }),
        _ => None,
    }
}

/// Submit the requests in order, wiring each one to the thread root and its
/// predecessor. Stops at the first failure.
pub async fn publish_thread(
    dest: &dyn DestinationClient,
    requests: Vec<DestinationPostRequest>,
) -> Result<Vec<PostRef>> {
    let total = requests.len();
    let mut refs: Vec<PostRef> = Vec::with_capacity(total);

    for (i, mut request) in requests.into_iter().enumerate() {
        request.reply = reply_link(refs.first(), refs.last());

        let post_ref = dest
            .create_post(&request)
            .await
            .with_context(|| format!("Failed to submit post {} of {}", i + 1, total))?;

        debug!(uri = post_ref.uri, part = i + 1, total = total, "Thread post created");
        refs.push(post_ref);
    }

    Ok(refs)
}
