//! Text preparation and word statistics for summarization input.
//!
//! Input length is capped by characters before tokenization. The cap is a
//! rough token estimate (four characters per token) that keeps the tokenizer
//! from chewing through megabytes of text it would truncate anyway.

/// Characters allowed per model input token when pre-truncating text.
pub const CHARS_PER_TOKEN: usize = 4;

/// Strip surrounding whitespace and cap the text at `max_tokens * 4` characters.
///
/// The cap counts Unicode scalar values, never splitting a character.
pub fn preprocess_text(text: &str, max_tokens: usize) -> &str {
    let text = text.trim();
    let max_chars = max_tokens.saturating_mul(CHARS_PER_TOKEN);
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Prepend the model's task prefix (e.g. `"summarize: "`).
pub fn with_task_prefix(prefix: &str, text: &str) -> String {
    let mut input = String::with_capacity(prefix.len() + text.len());
    input.push_str(prefix);
    input.push_str(text);
    input
}

/// Number of whitespace-separated words.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_surrounding_whitespace() {
        assert_eq!(preprocess_text("  \n hello world \t", 512), "hello world");
    }

    #[test]
    fn short_text_untouched() {
        let text = "The council approved the budget.";
        assert_eq!(preprocess_text(text, 512), text);
    }

    #[test]
    fn truncates_to_four_chars_per_token() {
        let text = "a".repeat(5000);
        let out = preprocess_text(&text, 512);
        assert_eq!(out.len(), 2048);
    }

    #[test]
    fn exact_limit_is_kept() {
        let text = "b".repeat(40);
        assert_eq!(preprocess_text(&text, 10).len(), 40);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        // Each 'é' is two bytes in UTF-8.
        let text = "é".repeat(10);
        let out = preprocess_text(&text, 1);
        assert_eq!(out.chars().count(), 4);
        assert_eq!(out, "éééé");
    }

    #[test]
    fn truncation_happens_after_trim() {
        let text = format!("    {}", "x".repeat(8));
        assert_eq!(preprocess_text(&text, 1), "xxxx");
    }

    #[test]
    fn whitespace_only_becomes_empty() {
        assert_eq!(preprocess_text(" \n\t ", 512), "");
    }

    #[test]
    fn task_prefix() {
        assert_eq!(
            with_task_prefix("summarize: ", "rain expected"),
            "summarize: rain expected"
        );
    }

    #[test]
    fn counts_words() {
        assert_eq!(word_count("one two  three\nfour\tfive"), 5);
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("   "), 0);
    }
}
