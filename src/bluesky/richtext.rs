// Rich-text facet detection for Bluesky posts.
//
// Bluesky doesn't linkify text on its own: links, mentions and hashtags
// only become clickable when the record carries facets with UTF-8 byte
// offsets. Detection here is pure; resolving mention handles to DIDs needs
// the network and happens in the client.

use std::sync::LazyLock;

use regex_lite::Regex;

use crate::models::ByteSlice;

static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s<>]+").expect("valid URL pattern"));

// Handle grammar: dot-separated DNS labels, at least two of them.
static MENTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:^|[\s(])(@(?:[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.)+[a-zA-Z](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)",
    )
    .expect("valid mention pattern")
});

static HASHTAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)(#[^\s#]+)").expect("valid hashtag pattern"));

/// Longest tag Bluesky accepts, without the leading `#`.
const MAX_TAG_LEN: usize = 64;

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', '"', '\''];

/// What a detected span refers to, before any network resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectedKind {
    Link(String),
    /// Handle without the leading `@`.
    Mention(String),
    /// Tag without the leading `#`.
    Tag(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedFacet {
    pub index: ByteSlice,
    pub kind: DetectedKind,
}

/// Find links, mentions and hashtags in `text`, ordered by position.
pub fn detect_facets(text: &str) -> Vec<DetectedFacet> {
    let mut found = Vec::new();

    for m in URL.find_iter(text) {
        let uri = trim_url(m.as_str());
        found.push(DetectedFacet {
            index: ByteSlice {
                byte_start: m.start(),
                byte_end: m.start() + uri.len(),
            },
            kind: DetectedKind::Link(uri.to_string()),
        });
    }

    for caps in MENTION.captures_iter(text) {
        let Some(m) = caps.get(1) else { continue };
        if overlaps(&found, m.start(), m.end()) {
            continue;
        }
        found.push(DetectedFacet {
            index: ByteSlice {
                byte_start: m.start(),
                byte_end: m.end(),
            },
            kind: DetectedKind::Mention(m.as_str()[1..].to_lowercase()),
        });
    }

    for caps in HASHTAG.captures_iter(text) {
        let Some(m) = caps.get(1) else { continue };
        let raw = m.as_str().trim_end_matches(TRAILING_PUNCTUATION);
        let tag = &raw[1..];
        if tag.is_empty()
            || tag.chars().all(|c| c.is_ascii_digit())
            || tag.chars().count() > MAX_TAG_LEN
            || overlaps(&found, m.start(), m.start() + raw.len())
        {
            continue;
        }
        found.push(DetectedFacet {
            index: ByteSlice {
                byte_start: m.start(),
                byte_end: m.start() + raw.len(),
            },
            kind: DetectedKind::Tag(tag.to_string()),
        });
    }

    found.sort_by_key(|f| f.index.byte_start);
    found
}

/// Drop trailing sentence punctuation and an unbalanced closing paren.
fn trim_url(url: &str) -> &str {
    let mut url = url.trim_end_matches(TRAILING_PUNCTUATION);
    if url.ends_with(')') && !url.contains('(') {
        url = url[..url.len() - 1].trim_end_matches(TRAILING_PUNCTUATION);
    }
    url
}

fn overlaps(found: &[DetectedFacet], start: usize, end: usize) -> bool {
    found
        .iter()
        .any(|f| start < f.index.byte_end && f.index.byte_start < end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<DetectedKind> {
        detect_facets(text).into_iter().map(|f| f.kind).collect()
    }

    #[test]
    fn test_detects_link_with_byte_offsets() {
        let text = "héllo https://example.com/a?b=c.";
        let facets = detect_facets(text);
        assert_eq!(facets.len(), 1);
        let f = &facets[0];
        assert_eq!(
            &text[f.index.byte_start..f.index.byte_end],
            "https://example.com/a?b=c"
        );
        assert_eq!(f.index.byte_start, "héllo ".len());
    }

    #[test]
    fn test_url_unbalanced_paren_trimmed() {
        assert_eq!(
            kinds("(see https://example.com/x)"),
            vec![DetectedKind::Link("https://example.com/x".into())]
        );
        assert_eq!(
            kinds("https://en.wikipedia.org/wiki/Rust_(language)"),
            vec![DetectedKind::Link(
                "https://en.wikipedia.org/wiki/Rust_(language)".into()
            )]
        );
    }

    #[test]
    fn test_detects_mentions() {
        assert_eq!(
            kinds("hi @Alice.bsky.social and @bob"),
            vec![DetectedKind::Mention("alice.bsky.social".into())]
        );
    }

    #[test]
    fn test_fediverse_address_is_not_a_mention() {
        assert!(kinds("ping @bob@mastodon.social").is_empty());
    }

    #[test]
    fn test_detects_hashtags() {
        assert_eq!(
            kinds("#rust is fun, #2024 is not a tag, #async!"),
            vec![
                DetectedKind::Tag("rust".into()),
                DetectedKind::Tag("async".into())
            ]
        );
    }

    #[test]
    fn test_url_fragment_is_not_a_hashtag() {
        assert_eq!(
            kinds("https://example.com/#section"),
            vec![DetectedKind::Link("https://example.com/#section".into())]
        );
    }

    #[test]
    fn test_facets_sorted_by_position() {
        let facets = detect_facets("#one @a.example https://x.example");
        let starts: Vec<usize> = facets.iter().map(|f| f.index.byte_start).collect();
        assert_eq!(starts, vec![0, 5, 16]);
    }
}
