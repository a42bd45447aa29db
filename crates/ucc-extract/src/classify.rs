//! `ClauseClassifier` (`spec.md` §4.3): two-stage deterministic classifier.

use regex::Regex;
use std::sync::OnceLock;

use ucc_core::lexicon::{
    CONDITION_CUES, COVERAGE_CUES, DEDUCTIBLE_CUES, DEFINITION_CUES, EXCLUSION_CUES,
    SUBJECTIVITY_CUES, WARRANTY_CUES,
};
use ucc_core::types::{Block, ClauseType};

fn extension_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)extension").unwrap())
}

fn endorsement_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)endorsement").unwrap())
}

/// Tie-break priority (highest first) when multiple types score equally,
/// per `spec.md` §4.3 stage 2.
const TIE_BREAK_ORDER: &[ClauseType] = &[
    ClauseType::Exclusion,
    ClauseType::Condition,
    ClauseType::Coverage,
    ClauseType::Extension,
    ClauseType::Endorsement,
    ClauseType::Warranty,
    ClauseType::Subjectivity,
    ClauseType::Deductible,
    ClauseType::Definition,
];

fn count_cues(text_lower: &str, cues: &[&str]) -> u32 {
    cues.iter()
        .map(|cue| text_lower.matches(cue).count() as u32)
        .sum()
}

pub struct ClauseClassifier;

impl ClauseClassifier {
    /// Assigns a `ClauseType` to a single block (ignoring `is_admin`, which
    /// the caller should already have determined via `LayoutExtractor`).
    pub fn classify(&self, block: &Block) -> ClauseType {
        let lower = block.text.to_lowercase();
        let in_extension_section = block
            .section_path
            .iter()
            .any(|h| extension_re().is_match(h));
        let in_endorsement_section = block
            .section_path
            .iter()
            .any(|h| endorsement_re().is_match(h));

        let mut scores: Vec<(ClauseType, u32)> = vec![
            (ClauseType::Exclusion, count_cues(&lower, EXCLUSION_CUES)),
            (ClauseType::Condition, count_cues(&lower, CONDITION_CUES)),
            (ClauseType::Warranty, count_cues(&lower, WARRANTY_CUES)),
            (ClauseType::Definition, count_cues(&lower, DEFINITION_CUES)),
            (ClauseType::Coverage, count_cues(&lower, COVERAGE_CUES)),
            (ClauseType::Deductible, count_cues(&lower, DEDUCTIBLE_CUES)),
            (
                ClauseType::Subjectivity,
                count_cues(&lower, SUBJECTIVITY_CUES),
            ),
            (
                ClauseType::Extension,
                if in_extension_section { 1 } else { 0 },
            ),
            (
                ClauseType::Endorsement,
                if in_endorsement_section { 1 } else { 0 },
            ),
        ];

        scores.retain(|(_, score)| *score > 0);
        if scores.is_empty() {
            return ClauseType::Admin;
        }

        let max_score = scores.iter().map(|(_, s)| *s).max().unwrap_or(0);
        let tied: Vec<ClauseType> = scores
            .into_iter()
            .filter(|(_, s)| *s == max_score)
            .map(|(t, _)| t)
            .collect();

        for candidate in TIE_BREAK_ORDER {
            if tied.contains(candidate) {
                return *candidate;
            }
        }
        ClauseType::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(text: &str) -> Block {
        Block::new("doc1", 0, text, 1, 1, vec![])
    }

    #[test]
    fn exclusion_cue_wins_over_nothing() {
        let classifier = ClauseClassifier;
        let b = block("We will not pay for war damage. This is an exclusion.");
        assert_eq!(classifier.classify(&b), ClauseType::Exclusion);
    }

    #[test]
    fn coverage_cue_detected() {
        let classifier = ClauseClassifier;
        let b = block("We will pay for accidental damage to the insured property.");
        assert_eq!(classifier.classify(&b), ClauseType::Coverage);
    }

    #[test]
    fn tie_break_prefers_exclusion_over_condition() {
        let classifier = ClauseClassifier;
        // Both "we will not pay" (exclusion) and "provided that" (condition) appear once.
        let b = block("We will not pay unless provided that notice is given.");
        assert_eq!(classifier.classify(&b), ClauseType::Exclusion);
    }

    #[test]
    fn no_cues_tags_admin() {
        let classifier = ClauseClassifier;
        let b = block("Insured name: Acme Pty Ltd.");
        assert_eq!(classifier.classify(&b), ClauseType::Admin);
    }

    #[test]
    fn extension_section_heading_drives_extension_type() {
        let classifier = ClauseClassifier;
        let b = Block::new(
            "doc1",
            0,
            "Additional cover applies during renovation.",
            1,
            1,
            vec!["Extensions".to_string()],
        );
        assert_eq!(classifier.classify(&b), ClauseType::Extension);
    }
}
