//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token. This is an
//! approximation, not a tokenizer. The compressor and the quality analyzer
//! must both go through this module so their numbers never drift apart.

/// Characters per estimated token.
pub const CHARS_PER_TOKEN: usize = 4;

/// Length of `text` in characters (Unicode scalar values).
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 characters. Rounds up, so a string fits a budget
/// of `n` tokens exactly when it is at most `4 * n` characters long.
pub fn estimate_tokens(text: &str) -> usize {
    char_len(text).div_ceil(CHARS_PER_TOKEN)
}

/// Character allowance for a token budget.
pub fn tokens_to_chars(tokens: usize) -> usize {
    tokens.saturating_mul(CHARS_PER_TOKEN)
}

/// The first `max_chars` characters of `text`.
pub fn take_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn four_chars_is_one_token() {
        assert_eq!(estimate_tokens("test"), 1);
    }

    #[test]
    fn five_chars_rounds_up() {
        assert_eq!(estimate_tokens("hello"), 2);
    }

    #[test]
    fn hundred_chars() {
        let text = "a".repeat(100);
        assert_eq!(estimate_tokens(&text), 25);
    }

    #[test]
    fn counts_characters_not_bytes() {
        // 4 ideographs are 12 bytes but 4 characters.
        assert_eq!(estimate_tokens("勇者说道"), 1);
        assert_eq!(char_len("勇者说道"), 4);
    }

    #[test]
    fn take_chars_respects_char_boundaries() {
        assert_eq!(take_chars("勇者说道", 2), "勇者");
        assert_eq!(take_chars("abc", 10), "abc");
        assert_eq!(take_chars("abc", 0), "");
    }

    #[test]
    fn tokens_to_chars_saturates() {
        assert_eq!(tokens_to_chars(10), 40);
        assert_eq!(tokens_to_chars(usize::MAX), usize::MAX);
    }
}
