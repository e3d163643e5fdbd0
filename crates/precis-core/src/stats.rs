//! Summary statistics reported alongside each generated summary.

use serde::{Deserialize, Serialize};

use crate::text::word_count;

/// Word counts for the original text and the summary, plus compression.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub original_length: usize,
    pub summary_length: usize,
    /// Percentage of words removed, rounded to two decimals. Negative when the
    /// summary is longer than the original; `0` for an original with no words.
    pub compression_ratio: f64,
}

impl SummaryStats {
    /// Compute statistics from the untouched request text and the summary.
    pub fn compute(original: &str, summary: &str) -> Self {
        let original_length = word_count(original);
        let summary_length = word_count(summary);
        let compression_ratio = if original_length > 0 {
            round2((1.0 - summary_length as f64 / original_length as f64) * 100.0)
        } else {
            0.0
        };
        Self {
            original_length,
            summary_length,
            compression_ratio,
        }
    }
}

/// Two-decimal rounding with ties going to the even digit.
fn round2(v: f64) -> f64 {
    (v * 100.0).round_ties_even() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_the_words() {
        let s = SummaryStats::compute("a b c d", "a b");
        assert_eq!(s.original_length, 4);
        assert_eq!(s.summary_length, 2);
        assert_eq!(s.compression_ratio, 50.0);
    }

    #[test]
    fn rounds_to_two_decimals() {
        // 1 - 1/3 = 66.666..%
        let s = SummaryStats::compute("one two three", "one");
        assert_eq!(s.compression_ratio, 66.67);
    }

    #[test]
    fn exact_halves_round_to_even() {
        // 1 - 3/32 = 90.625% exactly
        let s = SummaryStats::compute(&"w ".repeat(32), "a b c");
        assert_eq!(s.compression_ratio, 90.62);

        // 1 - 1/8 = 87.5%, nothing to round
        let s = SummaryStats::compute(&"w ".repeat(8), "a");
        assert_eq!(s.compression_ratio, 87.5);
    }

    #[test]
    fn empty_original_yields_zero_ratio() {
        let s = SummaryStats::compute("   ", "something came out");
        assert_eq!(s.original_length, 0);
        assert_eq!(s.summary_length, 3);
        assert_eq!(s.compression_ratio, 0.0);
    }

    #[test]
    fn longer_summary_is_negative() {
        let s = SummaryStats::compute("short text", "a much longer summary text");
        assert_eq!(s.compression_ratio, -150.0);
    }

    #[test]
    fn empty_summary_is_full_compression() {
        let s = SummaryStats::compute("several words here", "");
        assert_eq!(s.summary_length, 0);
        assert_eq!(s.compression_ratio, 100.0);
    }
}
