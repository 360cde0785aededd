//! Numeric measurement extraction.
//!
//! Fallback used when the extractive reader produces no usable answer for a
//! chunk: spec-sheet questions ("what is the weight?") usually have a
//! measurement-shaped answer sitting verbatim in the text. Four shapes are
//! recognized, in priority order:
//!
//! 1. triple dimension  `10 x 20 x 30 cm`
//! 2. double dimension  `1920 x 1080 px`
//! 3. range             `10 hours - 12 hours` (hyphen or en-dash)
//! 4. single            `0.209 kg`
//!
//! Matches are collected grouped by shape priority, then by position. If the
//! question names a unit, the match closest to an occurrence of that unit in
//! the context wins; otherwise the first collected match does. Finding
//! nothing is a normal outcome, not an error.

use regex::Regex;
use std::collections::HashSet;

/// Unit vocabulary, ordered so that no entry shadows a longer one during
/// alternation (the regex engine takes the first alternative that fits).
const UNIT_WORDS: &[&str] = &[
    "minutes", "seconds", "hours", "khz", "mhz", "ghz", "mah", "lbs", "mm", "cm", "kg", "lb",
    "px", "in", "hz", "g", "m", "v", "w",
];

const NUMBER: &str = r"\d+(?:\.\d+)?";

pub struct NumericExtractor {
    /// Compiled patterns in priority order: triple, double, range, single.
    patterns: [Regex; 4],
}

impl NumericExtractor {
    pub fn new() -> Self {
        // Word units take a trailing \b so "5 m" does not swallow the start
        // of "5 min"; the inch quote is not a word character and takes none.
        let unit = format!(r#"(?:(?:{})\b|")"#, UNIT_WORDS.join("|"));
        let triple = format!(r"(?i){n}\s*x\s*{n}\s*x\s*{n}\s*{u}", n = NUMBER, u = unit);
        let double = format!(r"(?i){n}\s*x\s*{n}\s*{u}", n = NUMBER, u = unit);
        let range = format!(r"(?i){n}\s*{u}\s*[-–]\s*{n}\s*{u}", n = NUMBER, u = unit);
        let single = format!(r"(?i){n}\s*{u}", n = NUMBER, u = unit);

        Self {
            patterns: [
                Regex::new(&triple).expect("triple dimension regex is valid"),
                Regex::new(&double).expect("double dimension regex is valid"),
                Regex::new(&range).expect("range regex is valid"),
                Regex::new(&single).expect("single measurement regex is valid"),
            ],
        }
    }

    /// Find the most plausible measurement in `context` for `question`.
    /// Returns `None` when the context holds no recognizable measurement.
    pub fn extract(&self, question: &str, context: &str) -> Option<String> {
        let mut found: Vec<(usize, String)> = Vec::new();
        for pattern in &self.patterns {
            for m in pattern.find_iter(context) {
                found.push((m.start(), m.as_str().to_string()));
            }
        }
        if found.is_empty() {
            return None;
        }

        let mentioned = mentioned_units(question);
        if !mentioned.is_empty() {
            // ASCII lowering keeps byte offsets aligned with the original.
            let lowered = context.to_ascii_lowercase();
            let mut offsets: Vec<usize> = Vec::new();
            for unit in &mentioned {
                offsets.extend(lowered.match_indices(*unit).map(|(pos, _)| pos));
            }
            if !offsets.is_empty() {
                let mut best: Option<(usize, usize)> = None;
                for (idx, (start, _)) in found.iter().enumerate() {
                    let distance = offsets
                        .iter()
                        .map(|&pos| start.abs_diff(pos))
                        .min()
                        .unwrap_or(usize::MAX);
                    // Strict < keeps the earlier match on equal distance.
                    if best.map(|(d, _)| distance < d).unwrap_or(true) {
                        best = Some((distance, idx));
                    }
                }
                if let Some((_, idx)) = best {
                    return Some(found[idx].1.clone());
                }
            }
        }

        found.first().map(|(_, text)| text.clone())
    }
}

impl Default for NumericExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Units the question names outright. Tokens are compared whole against the
/// vocabulary: "weight" must not count as mentioning "g".
fn mentioned_units(question: &str) -> Vec<&'static str> {
    let lowered = question.to_ascii_lowercase();
    let tokens: HashSet<&str> = lowered
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_ascii_alphanumeric()))
        .filter(|t| !t.is_empty())
        .collect();
    UNIT_WORDS
        .iter()
        .copied()
        .filter(|unit| tokens.contains(unit))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(question: &str, context: &str) -> Option<String> {
        NumericExtractor::new().extract(question, context)
    }

    #[test]
    fn test_single_measurement_first_in_text_order() {
        let answer = extract("what is the weight?", "Weight: 0.209 kg, width 12 cm");
        assert_eq!(answer.as_deref(), Some("0.209 kg"));
    }

    #[test]
    fn test_double_dimension_beats_single_by_priority() {
        let answer = extract("resolution?", "Screen is 1920 x 1080 px and battery 4500 mah");
        assert_eq!(answer.as_deref(), Some("1920 x 1080 px"));
    }

    #[test]
    fn test_triple_dimension_wins_over_double() {
        let answer = extract("dimensions?", "Box is 10 x 20 x 30 cm when packed");
        assert_eq!(answer.as_deref(), Some("10 x 20 x 30 cm"));
    }

    #[test]
    fn test_range_with_en_dash() {
        let answer = extract("battery life?", "Battery lasts 10 hours – 12 hours per charge");
        assert_eq!(answer.as_deref(), Some("10 hours – 12 hours"));
    }

    #[test]
    fn test_range_with_hyphen() {
        let answer = extract("voltage?", "Input: 5 v - 12 v supported");
        assert_eq!(answer.as_deref(), Some("5 v - 12 v"));
    }

    #[test]
    fn test_unit_hint_selects_nearest_match() {
        let answer = extract("how many kg does it weigh?", "Width 12 cm. Mass: 3 kg");
        assert_eq!(answer.as_deref(), Some("3 kg"));
    }

    #[test]
    fn test_inch_quote_unit() {
        let answer = extract("screen size?", "The display measures 27\" diagonally");
        assert_eq!(answer.as_deref(), Some("27\""));
    }

    #[test]
    fn test_case_insensitive_units_kept_verbatim() {
        let answer = extract("weight?", "Shipping weight 2 KG");
        assert_eq!(answer.as_deref(), Some("2 KG"));
    }

    #[test]
    fn test_unit_adjacent_to_number() {
        let answer = extract("battery?", "Rated at 4500mah typical");
        assert_eq!(answer.as_deref(), Some("4500mah"));
    }

    #[test]
    fn test_units_require_word_boundary() {
        assert_eq!(extract("how long?", "wait 5 min then retry"), None);
        assert_eq!(extract("weight?", "about 5 grams total"), None);
    }

    #[test]
    fn test_no_measurement_returns_none() {
        assert_eq!(extract("weight?", "no numbers here at all"), None);
        assert_eq!(extract("weight?", ""), None);
    }

    #[test]
    fn test_question_hint_with_no_context_occurrence_falls_back() {
        // "mm" is asked about but never appears; priority order applies.
        let answer = extract("thickness in mm?", "Panel is 1920 x 1080 px, weighs 2 kg");
        assert_eq!(answer.as_deref(), Some("1920 x 1080 px"));
    }
}
