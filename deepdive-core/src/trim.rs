//! Token-budget prompt trimming.
//!
//! Bounds arbitrary text to a token budget before it is placed in a model
//! prompt. Token counts are estimated (about four characters per token);
//! when over budget the text is cut at separator boundaries using a
//! recursive character splitter, falling back to a hard character slice.

/// Estimated characters per token, used both for the token estimate and for
/// converting token overflow into a character cut.
const CHARS_PER_TOKEN: usize = 4;

/// Characters removed per overflow token when computing the cut point.
const OVERFLOW_SHRINK: usize = 3;

/// Floor below which trimming stops shrinking; a chunk at or under this
/// length is returned as-is even if it still exceeds the token budget,
/// which guarantees termination.
const MIN_CHUNK_SIZE: usize = 140;

/// Split boundaries tried in order, most structural first.
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " "];

/// Estimate the token count of a text.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Trim `text` so its estimated token count fits within `max_tokens`.
///
/// Returns the input unchanged when already within budget, and an empty
/// string for empty input. Never panics and never loops indefinitely: each
/// round removes at least [`OVERFLOW_SHRINK`] characters until the result
/// fits or reaches the [`MIN_CHUNK_SIZE`] floor.
pub fn trim_prompt(text: &str, max_tokens: usize) -> String {
    if text.is_empty() {
        return String::new();
    }

    let tokens = estimate_tokens(text);
    if tokens <= max_tokens {
        return text.to_string();
    }

    let char_len = text.chars().count();
    let overflow = tokens - max_tokens;
    let chunk_size = char_len.saturating_sub(overflow * OVERFLOW_SHRINK);
    if chunk_size < MIN_CHUNK_SIZE {
        return take_chars(text, MIN_CHUNK_SIZE);
    }

    let trimmed = split_text(text, chunk_size)
        .into_iter()
        .next()
        .unwrap_or_default();

    // Degenerate split: the first chunk did not shrink the text, so cut hard
    // at the character budget and keep going.
    if trimmed.chars().count() == char_len {
        return trim_prompt(&take_chars(text, chunk_size), max_tokens);
    }

    trim_prompt(&trimmed, max_tokens)
}

/// Split `text` into chunks of at most `chunk_size` characters, cutting at
/// the most structural separator available and never overlapping.
pub fn split_text(text: &str, chunk_size: usize) -> Vec<String> {
    if chunk_size == 0 {
        return vec![text.to_string()];
    }
    split_recursive(text, chunk_size, SEPARATORS)
}

fn split_recursive(text: &str, chunk_size: usize, separators: &[&str]) -> Vec<String> {
    if text.chars().count() <= chunk_size {
        return vec![text.to_string()];
    }

    let Some((sep, rest)) = separators.split_first() else {
        return hard_chunks(text, chunk_size);
    };
    if !text.contains(sep) {
        return split_recursive(text, chunk_size, rest);
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    for piece in split_keeping_separator(text, sep) {
        let piece_len = piece.chars().count();
        if !current.is_empty() && current.chars().count() + piece_len > chunk_size {
            chunks.push(std::mem::take(&mut current));
        }
        if piece_len > chunk_size {
            chunks.extend(split_recursive(&piece, chunk_size, rest));
        } else {
            current.push_str(&piece);
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Split on `sep`, keeping the separator attached to the preceding piece so
/// concatenating the pieces reproduces the input.
fn split_keeping_separator(text: &str, sep: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut rest = text;
    while let Some(pos) = rest.find(sep) {
        let end = pos + sep.len();
        pieces.push(rest[..end].to_string());
        rest = &rest[end..];
    }
    if !rest.is_empty() {
        pieces.push(rest.to_string());
    }
    pieces
}

fn hard_chunks(text: &str, chunk_size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(chunk_size)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// First `count` characters of `text` (the whole text when shorter).
fn take_chars(text: &str, count: usize) -> String {
    text.chars().take(count).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_empty_input_returns_empty() {
        assert_eq!(trim_prompt("", 100), "");
    }

    #[test]
    fn test_within_budget_unchanged() {
        let text = "short text";
        assert_eq!(trim_prompt(text, 100), text);
    }

    #[test]
    fn test_result_fits_budget() {
        let text = "sentence one. ".repeat(500);
        let trimmed = trim_prompt(&text, 100);
        assert!(estimate_tokens(&trimmed) <= 100 || trimmed.chars().count() <= MIN_CHUNK_SIZE);
        assert!(trimmed.chars().count() <= text.chars().count());
    }

    #[test]
    fn test_prefers_separator_boundaries() {
        let text = format!("{}\n\n{}", "a".repeat(400), "b".repeat(4000));
        let trimmed = trim_prompt(&text, 200);
        // The first paragraph fits the budget; the cut lands on the break.
        assert!(trimmed.starts_with("aaaa"));
        assert!(!trimmed.contains('b'));
    }

    #[rstest]
    #[case::no_separators("x".repeat(10_000), 50)]
    #[case::only_spaces("word ".repeat(5_000), 80)]
    #[case::newlines("line\n".repeat(5_000), 120)]
    #[case::tiny_budget("some text that is long enough to overflow a tiny budget".repeat(40), 1)]
    fn test_trim_terminates(#[case] text: String, #[case] max_tokens: usize) {
        let trimmed = trim_prompt(&text, max_tokens);
        assert!(trimmed.chars().count() <= text.chars().count());
    }

    #[rstest]
    #[case("paragraph one.\n\nparagraph two. ".repeat(300), 50)]
    #[case("x".repeat(3_000), 10)]
    #[case("hello world. ".repeat(1_000), 1)]
    fn test_trim_idempotent(#[case] text: String, #[case] max_tokens: usize) {
        let once = trim_prompt(&text, max_tokens);
        let twice = trim_prompt(&once, max_tokens);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_min_floor_returned_even_over_budget() {
        let text = "z".repeat(10_000);
        let trimmed = trim_prompt(&text, 1);
        assert_eq!(trimmed.chars().count(), MIN_CHUNK_SIZE);
    }

    #[test]
    fn test_split_text_concatenation_preserves_input() {
        let text = "one two three. four five six.\nseven eight.\n\nnine ten.";
        let chunks = split_text(text, 12);
        assert_eq!(chunks.concat(), text);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 12, "oversized chunk: {:?}", chunk);
        }
    }

    #[test]
    fn test_split_text_unicode_safe() {
        let text = "😀😁😂🤣😃 ".repeat(100);
        let chunks = split_text(&text, 7);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_hard_chunks_when_no_separator() {
        let text = "abcdefghij";
        let chunks = split_text(text, 3);
        assert_eq!(chunks, vec!["abc", "def", "ghi", "j"]);
    }
}
