// Composition tests - verifying that pure functions chain together correctly.
//
// These tests exercise the data flow between modules:
//   HTML -> normalize -> split_text -> detect_facets -> PostRecord
// without any network calls or filesystem side effects.

use chrono::{TimeZone, Utc};

use mastodon_to_bluesky::bluesky::client::PostRecord;
use mastodon_to_bluesky::bluesky::richtext::{detect_facets, DetectedKind};
use mastodon_to_bluesky::models::{
    ByteSlice, DestinationPostRequest, Facet, FacetFeature,
};
use mastodon_to_bluesky::pipeline::normalize::normalize;
use mastodon_to_bluesky::pipeline::segment::{split_text, MAX_POST_LENGTH};

fn slice(text: &str, index: ByteSlice) -> &str {
    &text[index.byte_start..index.byte_end]
}

// ============================================================
// Chain: normalize -> split_text
// ============================================================

#[test]
fn short_html_post_is_one_chunk() {
    let text = normalize("<p>Hello</p><p>World</p>", None);
    assert_eq!(text, "Hello\n\nWorld");
    assert_eq!(split_text(&text, MAX_POST_LENGTH), vec!["Hello\n\nWorld"]);
}

#[test]
fn content_warning_leads_the_first_chunk_only() {
    let sentence = "This sentence is about forty chars long.";
    let body: String = (0..12).map(|_| format!("<p>{sentence}</p>")).collect();
    let text = normalize(&body, Some("long post"));

    let chunks = split_text(&text, MAX_POST_LENGTH);
    assert!(chunks.len() > 1);
    assert!(chunks[0].starts_with("[1/"));
    assert!(chunks[0].contains("CW: long post"));
    assert!(chunks[1..].iter().all(|c| !c.contains("CW:")));
    assert!(chunks.iter().all(|c| c.chars().count() <= MAX_POST_LENGTH));
}

#[test]
fn entities_decoded_before_splitting() {
    let text = normalize("<p>Fish &amp; chips &lt;3</p>", None);
    let chunks = split_text(&text, MAX_POST_LENGTH);
    assert_eq!(chunks, vec!["Fish & chips <3"]);
}

// ============================================================
// Chain: normalize -> split_text -> detect_facets
// ============================================================

#[test]
fn links_survive_splitting_intact() {
    let filler = "Some words to pad the post out a bit. ".repeat(9);
    let html = format!(
        "<p>{filler}Read more at <a href=\"https://example.com/article\">https://example.com/article</a>. #rustlang</p>"
    );
    let text = normalize(&html, None);
    let chunks = split_text(&text, MAX_POST_LENGTH);
    assert!(chunks.len() > 1);

    let last = chunks.last().unwrap();
    let facets = detect_facets(last);
    let link = facets
        .iter()
        .find(|f| matches!(f.kind, DetectedKind::Link(_)))
        .expect("link facet in last chunk");
    assert_eq!(slice(last, link.index), "https://example.com/article");

    let tag = facets
        .iter()
        .find(|f| matches!(f.kind, DetectedKind::Tag(_)))
        .expect("tag facet in last chunk");
    assert_eq!(tag.kind, DetectedKind::Tag("rustlang".into()));
    assert_eq!(slice(last, tag.index), "#rustlang");
}

#[test]
fn facet_offsets_are_bytes_after_multibyte_text() {
    let text = normalize("<p>Café ☕ with @alice.bsky.social</p>", None);
    let facets = detect_facets(&text);
    assert_eq!(facets.len(), 1);
    assert_eq!(facets[0].kind, DetectedKind::Mention("alice.bsky.social".into()));
    assert_eq!(slice(&text, facets[0].index), "@alice.bsky.social");
    assert!(facets[0].index.byte_start > text[..facets[0].index.byte_start].chars().count());
}

// ============================================================
// Chain: request -> PostRecord wire JSON
// ============================================================

#[test]
fn record_carries_facets_with_byte_offsets() {
    let text = "see https://example.com";
    let detected = detect_facets(text);
    let facets: Vec<Facet> = detected
        .into_iter()
        .map(|d| Facet {
            index: d.index,
            features: vec![match d.kind {
                DetectedKind::Link(uri) => FacetFeature::Link { uri },
                other => panic!("unexpected facet {other:?}"),
            }],
        })
        .collect();

    let request = DestinationPostRequest {
        text: text.to_string(),
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
        facets,
        embed: None,
        reply: None,
        langs: vec!["en".into()],
    };

    let json = serde_json::to_value(PostRecord::from_request(&request)).unwrap();
    assert_eq!(json["text"], text);
    assert_eq!(json["createdAt"], "2024-05-01T08:00:00.000Z");
    assert_eq!(json["facets"][0]["index"]["byteStart"], 4);
    assert_eq!(json["facets"][0]["index"]["byteEnd"], 23);
    assert_eq!(
        json["facets"][0]["features"][0]["$type"],
        "app.bsky.richtext.facet#link"
    );
    assert_eq!(json["langs"][0], "en");
}
