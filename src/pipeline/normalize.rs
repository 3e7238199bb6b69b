// Content normalizer: Mastodon HTML -> plain text for Bluesky.
//
// Mastodon serves post bodies as a small HTML subset (<p>, <br>, <a>, <span>).
// Bluesky wants plain text, so we keep line structure and drop everything
// else. This is text extraction, not rendering.

use std::sync::LazyLock;

use regex_lite::{Captures, Regex};

static LINE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("valid <br> pattern"));

static PARAGRAPH_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</p\s*>").expect("valid </p> pattern"));

static ANY_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag pattern"));

static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]+);").expect("valid entity pattern")
});

// A newline followed by one or more (possibly space-only) lines.
static BLANK_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n(?:[ \t]*\n)+").expect("valid blank-run pattern"));

/// Convert a post body to plain text, prefixing the content warning if any.
///
/// With a warning the result is `CW: <warning>`, a blank line, then the body.
/// An empty body leaves just the warning line.
pub fn normalize(html: &str, content_warning: Option<&str>) -> String {
    let body = html_to_text(html);
    match content_warning.map(str::trim).filter(|cw| !cw.is_empty()) {
        Some(cw) if body.is_empty() => format!("CW: {cw}"),
        Some(cw) => format!("CW: {cw}\n\n{body}"),
        None => body,
    }
}

/// Extract plain text from a Mastodon HTML body.
///
/// `<br>` becomes a newline, a closing `</p>` becomes a blank line, all
/// other tags are dropped and character references are decoded. Blank-line
/// runs collapse to one and the result is trimmed.
pub fn html_to_text(html: &str) -> String {
    let text = LINE_BREAK.replace_all(html, "\n");
    let text = PARAGRAPH_END.replace_all(&text, "\n\n");
    let text = ANY_TAG.replace_all(&text, "");
    let text = ENTITY.replace_all(&text, |caps: &Captures| decode_entity(&caps[0], &caps[1]));
    let text = BLANK_RUN.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Decode one character reference. Unknown names are left as written.
fn decode_entity(whole: &str, name: &str) -> String {
    let decoded = if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => num.parse::<u32>().ok(),
        };
        code.and_then(char::from_u32)
    } else {
        match name {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some(' '),
            _ => None,
        }
    };
    decoded.map_or_else(|| whole.to_string(), String::from)
}
