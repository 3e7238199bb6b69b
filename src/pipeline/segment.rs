// Segmenter: split normalized text into posts that fit Bluesky's limit.
//
// Splits at sentence ends first, falls back to word boundaries for sentences
// that don't fit, and to raw characters for single words that don't fit.
// Chunks are joined into a thread, so each one carries continuation
// ellipses and, when there is more than one, an "[i/N] " position marker.
//
// Lengths are counted in chars, not bytes. The marker counts against the
// budget: every returned chunk, marker included, stays within `max_len`.
// A budget too small to hold markers and ellipses gets bare `max_len`
// pieces instead.

/// Bluesky's per-post text limit.
pub const MAX_POST_LENGTH: usize = 300;

/// Characters reserved in each chunk for continuation ellipses.
pub const ELLIPSIS_HEADROOM: usize = 10;

const ELLIPSIS: &str = "...";

/// Split `text` into chunks of at most `max_len` chars.
///
/// Text that already fits comes back unchanged as a single chunk.
/// Deterministic: the same input always yields the same chunks.
pub fn split_text(text: &str, max_len: usize) -> Vec<String> {
    if char_len(text) <= max_len {
        return vec![text.to_string()];
    }

    let base_room = max_len.saturating_sub(ELLIPSIS_HEADROOM);

    // Shrink the room until the markers for the resulting chunk count fit.
    // The count only grows as room shrinks, so this settles quickly.
    let mut marker_room = 0;
    loop {
        let room = base_room.saturating_sub(marker_room);
        if room == 0 {
            return hard_split(text, max_len.max(1));
        }
        let chunks = chunk_with_room(text, room);
        if chunks.len() <= 1 {
            return chunks;
        }
        let needed = marker_width(chunks.len());
        if needed <= marker_room {
            return add_markers(chunks);
        }
        marker_room = needed;
    }
}

/// Width of the widest "[i/N] " marker for a thread of `total` chunks.
pub fn marker_width(total: usize) -> usize {
    format!("[{total}/{total}] ").len()
}

fn add_markers(chunks: Vec<String>) -> Vec<String> {
    let total = chunks.len();
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| format!("[{}/{}] {}", i + 1, total, chunk))
        .collect()
}

/// Greedy packing of sentences (or words, or word pieces) into chunks whose
/// content is at most `room` chars, before ellipses.
fn chunk_with_room(text: &str, room: usize) -> Vec<String> {
    let mut packer = Packer::new(room);

    for sentence in split_sentences(text) {
        if char_len(sentence) <= room {
            packer.push(sentence);
            continue;
        }
        for word in sentence.split_whitespace() {
            if char_len(word) <= room {
                packer.push(word);
            } else {
                for piece in hard_split(word, room) {
                    packer.push(&piece);
                }
            }
        }
    }

    packer.finish()
}

struct Packer {
    room: usize,
    chunks: Vec<String>,
    current: String,
    current_len: usize,
}

impl Packer {
    fn new(room: usize) -> Self {
        Self {
            room,
            chunks: Vec::new(),
            current: String::new(),
            current_len: 0,
        }
    }

    /// Append a piece (at most `room` chars) to the current chunk, or close
    /// the current chunk and start a continued one.
    fn push(&mut self, piece: &str) {
        let piece_len = char_len(piece);

        if self.current.is_empty() {
            self.current.push_str(piece);
            self.current_len = piece_len;
            return;
        }

        if self.current_len + 1 + piece_len <= self.room {
            self.current.push(' ');
            self.current.push_str(piece);
            self.current_len += 1 + piece_len;
            return;
        }

        let mut closed = std::mem::take(&mut self.current);
        closed.push_str(ELLIPSIS);
        self.chunks.push(closed);

        self.current = format!("{ELLIPSIS}{piece}");
        self.current_len = ELLIPSIS.len() + piece_len;
    }

    fn finish(mut self) -> Vec<String> {
        if !self.current.is_empty() {
            self.chunks.push(self.current);
        }
        self.chunks
    }
}

/// Split after `.`, `!` or `?` when followed by whitespace. The whitespace
/// run between sentences is dropped.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut prev: Option<char> = None;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c.is_whitespace() && matches!(prev, Some('.' | '!' | '?')) {
            sentences.push(&text[start..i]);
            let mut end = i + c.len_utf8();
            while let Some(&(j, next)) = chars.peek() {
                if !next.is_whitespace() {
                    break;
                }
                end = j + next.len_utf8();
                chars.next();
            }
            start = end;
            prev = None;
            continue;
        }
        prev = Some(c);
    }

    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences.retain(|s| !s.trim().is_empty());
    sentences
}

fn hard_split(word: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    chars.chunks(size).map(|c| c.iter().collect()).collect()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentence_split_keeps_punctuation() {
        assert_eq!(
            split_sentences("One. Two!  Three?\nFour"),
            vec!["One.", "Two!", "Three?", "Four"]
        );
    }

    #[test]
    fn test_sentence_split_needs_whitespace_after_terminator() {
        assert_eq!(split_sentences("v1.2 is out. Yes"), vec!["v1.2 is out.", "Yes"]);
    }

    #[test]
    fn test_hard_split_respects_chars() {
        assert_eq!(hard_split("ééééé", 2), vec!["éé", "éé", "é"]);
    }

    #[test]
    fn test_marker_width() {
        assert_eq!(marker_width(3), "[3/3] ".len());
        assert_eq!(marker_width(12), "[12/12] ".len());
    }

    #[test]
    fn test_packer_continuation_ellipses() {
        let mut packer = Packer::new(10);
        packer.push("aaaa");
        packer.push("bbbb");
        packer.push("cccc");
        assert_eq!(packer.finish(), vec!["aaaa bbbb...", "...cccc"]);
    }
}
