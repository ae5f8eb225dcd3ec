//! Score parsers: pull a match percentage out of free-text model output.
//!
//! Default: `StrictLabelParser` (first integer after `Match Percentage:`).
//! Optional: `LenientPercentParser` as a fallback, chained via `ChainParser`.
//!
//! Parsers only locate a number. Range checking happens in the scorer.

use once_cell::sync::Lazy;
use regex::Regex;

static MATCH_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Match Percentage:\s*(\d+)").expect("valid regex"));

// Whole number only, so "2100%" reads as 2100 and fails the range check.
static PERCENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d+)\s*%").expect("valid regex"));

/// Strategy for reading a score from a model response.
pub trait ScoreParser: Send + Sync {
    /// Returns the raw number found, or `None` when the response has no score.
    fn parse(&self, response: &str) -> Option<u32>;

    /// Short label used in logs.
    fn name(&self) -> &'static str;
}

/// Matches the exact label the prompt asks for: `Match Percentage: NN`.
pub struct StrictLabelParser;

impl ScoreParser for StrictLabelParser {
    fn parse(&self, response: &str) -> Option<u32> {
        MATCH_LABEL_RE
            .captures(response)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }

    fn name(&self) -> &'static str {
        "strict"
    }
}

/// Takes the first `NN%` anywhere in the response.
pub struct LenientPercentParser;

impl ScoreParser for LenientPercentParser {
    fn parse(&self, response: &str) -> Option<u32> {
        PERCENT_RE
            .captures(response)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }

    fn name(&self) -> &'static str {
        "lenient"
    }
}

/// Tries each parser in order and returns the first hit.
pub struct ChainParser {
    parsers: Vec<Box<dyn ScoreParser>>,
}

impl ChainParser {
    pub fn new(parsers: Vec<Box<dyn ScoreParser>>) -> Self {
        Self { parsers }
    }
}

impl ScoreParser for ChainParser {
    fn parse(&self, response: &str) -> Option<u32> {
        self.parsers.iter().find_map(|p| p.parse(response))
    }

    fn name(&self) -> &'static str {
        "chain"
    }
}

/// Parser selected by configuration: strict only, or strict then lenient.
pub fn configured_parser(lenient: bool) -> Box<dyn ScoreParser> {
    if lenient {
        Box::new(ChainParser::new(vec![
            Box::new(StrictLabelParser),
            Box::new(LenientPercentParser),
        ]))
    } else {
        Box::new(StrictLabelParser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_reads_labelled_percentage() {
        let response = "Match Percentage: 87%\nExplanation: good fit";
        assert_eq!(StrictLabelParser.parse(response), Some(87));
    }

    #[test]
    fn test_strict_allows_no_space_after_label() {
        assert_eq!(StrictLabelParser.parse("Match Percentage:42%"), Some(42));
    }

    #[test]
    fn test_strict_takes_first_label_only() {
        let response = "Match Percentage: 60%\nMatch Percentage: 95%";
        assert_eq!(StrictLabelParser.parse(response), Some(60));
    }

    #[test]
    fn test_strict_without_label_is_none() {
        assert_eq!(StrictLabelParser.parse("I would rate this 80% overall."), None);
        assert_eq!(StrictLabelParser.parse(""), None);
    }

    #[test]
    fn test_strict_label_is_case_sensitive() {
        assert_eq!(StrictLabelParser.parse("match percentage: 70%"), None);
    }

    #[test]
    fn test_strict_reports_out_of_range_numbers_unchanged() {
        assert_eq!(StrictLabelParser.parse("Match Percentage: 250%"), Some(250));
    }

    #[test]
    fn test_strict_overflowing_number_is_none() {
        assert_eq!(
            StrictLabelParser.parse("Match Percentage: 99999999999999999999%"),
            None
        );
    }

    #[test]
    fn test_lenient_finds_bare_percentage() {
        assert_eq!(LenientPercentParser.parse("Overall fit is roughly 73 %."), Some(73));
        assert_eq!(LenientPercentParser.parse("no numbers here"), None);
    }

    #[test]
    fn test_lenient_reads_whole_number() {
        assert_eq!(LenientPercentParser.parse("Estimated 2100% fit"), Some(2100));
        assert_eq!(LenientPercentParser.parse("Estimated 1000% fit"), Some(1000));
        assert_eq!(LenientPercentParser.parse("ref A2100% only"), None);
    }

    #[test]
    fn test_chain_prefers_strict_label() {
        let parser = configured_parser(true);
        let response = "Skills overlap 40%.\nMatch Percentage: 65%";
        assert_eq!(parser.parse(response), Some(65));
    }

    #[test]
    fn test_chain_falls_back_to_lenient() {
        let parser = configured_parser(true);
        assert_eq!(parser.parse("Score: 55%"), Some(55));
    }

    #[test]
    fn test_configured_strict_has_no_fallback() {
        let parser = configured_parser(false);
        assert_eq!(parser.name(), "strict");
        assert_eq!(parser.parse("Score: 55%"), None);
    }
}
