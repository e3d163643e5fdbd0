//! Terminal output for summaries and health checks.
//!
//! Renders a summary as a wrapped paragraph followed by an aligned block of
//! statistics and the generation parameters that produced it.

use precis_core::{HealthResponse, SummaryResponse};

const WRAP_WIDTH: usize = 78;
const LABEL_WIDTH: usize = 20;

// ── Public API ──

/// Print a summary with its statistics.
pub fn print_summary(resp: &SummaryResponse) {
    println!("=== Summary ===");
    for line in wrap(&resp.summary, WRAP_WIDTH) {
        println!("{line}");
    }
    println!();

    println!("Statistics");
    print_field("original_length", format!("{} words", resp.original_length));
    print_field("summary_length", format!("{} words", resp.summary_length));
    print_field("compression_ratio", format!("{:.2}%", resp.compression_ratio));
    println!();

    println!("Parameters");
    print_field("max_length", resp.parameters.max_length);
    print_field("min_length", resp.parameters.min_length);
    print_field("num_beams", resp.parameters.num_beams);
}

/// Print a health response.
pub fn print_health(health: &HealthResponse) {
    print_field("status", &health.status);
    print_field("model_loaded", health.model_loaded);
    if let Some(err) = &health.error {
        print_field("error", err);
    }
}

// ── Formatting ──

fn print_field(label: &str, value: impl std::fmt::Display) {
    println!("  {label:<LABEL_WIDTH$} {value}");
}

/// Greedy word wrap. Words longer than `width` get a line of their own.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_breaks_on_word_boundaries() {
        let lines = wrap("the quick brown fox jumps over the lazy dog", 15);
        assert_eq!(lines, vec!["the quick brown", "fox jumps over", "the lazy dog"]);
    }

    #[test]
    fn wrap_keeps_long_words_whole() {
        let lines = wrap("a supercalifragilistic b", 10);
        assert_eq!(lines, vec!["a", "supercalifragilistic", "b"]);
    }

    #[test]
    fn wrap_empty_text() {
        assert!(wrap("   ", 10).is_empty());
    }
}
