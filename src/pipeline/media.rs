// Media resolver: copy a post's still images from Mastodon to Bluesky.
//
// Bluesky image embeds hold at most four images. Video, gifv and audio
// attachments have no equivalent here and are dropped.

use anyhow::{Context, Result};
use tracing::debug;

use crate::bluesky::traits::DestinationClient;
use crate::mastodon::traits::SourceClient;
use crate::models::{EmbedImage, ImageEmbed, MediaAttachment};

/// Most images a single Bluesky post can embed.
pub const MAX_IMAGES: usize = 4;

/// Bluesky's alt-text limit, in chars.
pub const MAX_ALT_TEXT: usize = 1000;

/// Download each still image (up to `MAX_IMAGES`, in original order) and
/// upload it to the destination.
///
/// Returns `None` when there is nothing to embed. Any download or upload
/// failure fails the whole post so it can be retried on the next run.
pub async fn resolve_media(
    source: &dyn SourceClient,
    dest: &dyn DestinationClient,
    attachments: &[MediaAttachment],
) -> Result<Option<ImageEmbed>> {
    let mut images = Vec::new();

    for attachment in select_images(attachments) {
        let data = source
            .download_media(&attachment.url)
            .await
            .with_context(|| format!("Failed to download image {}", attachment.url))?;

        let blob = dest
            .upload_image(&data)
            .await
            .with_context(|| format!("Failed to upload image {}", attachment.url))?;

        debug!(url = attachment.url, bytes = data.len(), "Image copied");

        images.push(EmbedImage {
            image: blob,
            alt: attachment.description.as_deref().map(truncate_alt),
            aspect_ratio: attachment.aspect_ratio,
        });
    }

    Ok((!images.is_empty()).then_some(ImageEmbed { images }))
}

/// The attachments that will be embedded: still images only, the first
/// `MAX_IMAGES` of them, in their original order.
pub fn select_images(attachments: &[MediaAttachment]) -> impl Iterator<Item = &MediaAttachment> {
    attachments
        .iter()
        .filter(|a| a.is_image())
        .take(MAX_IMAGES)
}

/// Cut alt text to `MAX_ALT_TEXT` chars. No ellipsis is added.
pub fn truncate_alt(description: &str) -> String {
    description.chars().take(MAX_ALT_TEXT).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaKind;

    fn attachment(kind: MediaKind, url: &str) -> MediaAttachment {
        MediaAttachment {
            kind,
            url: url.to_string(),
            description: None,
            aspect_ratio: None,
        }
    }

    #[test]
    fn test_select_images_skips_non_images_and_caps() {
        let list = vec![
            attachment(MediaKind::Video, "v0"),
            attachment(MediaKind::Image, "i1"),
            attachment(MediaKind::Image, "i2"),
            attachment(MediaKind::Gifv, "g3"),
            attachment(MediaKind::Image, "i4"),
            attachment(MediaKind::Image, "i5"),
            attachment(MediaKind::Image, "i6"),
            attachment(MediaKind::Audio, "a7"),
        ];
        let urls: Vec<&str> = select_images(&list).map(|a| a.url.as_str()).collect();
        assert_eq!(urls, vec!["i1", "i2", "i4", "i5"]);
    }

    #[test]
    fn test_truncate_alt_counts_chars() {
        let long = "é".repeat(1500);
        let cut = truncate_alt(&long);
        assert_eq!(cut.chars().count(), MAX_ALT_TEXT);
        assert!(!cut.ends_with("..."));
        assert_eq!(truncate_alt("short"), "short");
    }
}
