//! `DNAExtractor` (`spec.md` §4.4): computes `ClauseDna` for a non-admin block.

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use ucc_core::lexicon::{
    CARVE_OUT_TRIGGERS, CONDITIONAL_CONJUNCTIONS, COVERAGE_CUES, DISCRETIONARY_VERBS,
    EXCLUSION_CUES, SCOPE_CONNECTORS,
};
use ucc_core::types::{Block, ClauseDna, Polarity, Strictness, TemporalRange, TemporalUnit};

/// Fixed lexicon of recognized clause entities (`spec.md` §3: "extract on a
/// fixed lexicon").
const ENTITY_LEXICON: &[&str] = &[
    "insured",
    "insurer",
    "policyholder",
    "claimant",
    "beneficiary",
    "third party",
    "broker",
    "underwriter",
    "contractor",
    "employee",
    "director",
    "officer",
];

const BURDEN_SHIFT_CUES: &[&str] = &[
    "you must",
    "the insured must",
    "it is a condition that the insured",
    "you are required to",
    "you shall",
    "is filed within",
    "must notify",
    "must be filed",
];

fn currency_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:A\$|AUD\s?\$?|\$)\s?([0-9][0-9,]*(?:\.[0-9]+)?)").unwrap()
    })
}

fn percentage_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([0-9]+(?:\.[0-9]+)?)\s?%").unwrap())
}

fn duration_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)([0-9]+)\s*(day|days|month|months|year|years)").unwrap())
}

fn window(text: &str, at: usize, radius: usize) -> String {
    let start = at.saturating_sub(radius);
    let end = (at + radius).min(text.len());
    text.get(start..end).unwrap_or(text).to_lowercase()
}

fn canonical_numeric_field(text_lower: &str, match_start: usize) -> &'static str {
    let ctx = window(text_lower, match_start, 40);
    if ctx.contains("limit") || ctx.contains("sum insured") || ctx.contains("indemnity") {
        "limit"
    } else if ctx.contains("excess") || ctx.contains("deductible") || ctx.contains("retention") {
        "deductible"
    } else {
        "other"
    }
}

pub struct DnaExtractor;

impl DnaExtractor {
    pub fn extract(&self, block: &Block) -> ClauseDna {
        let lower = block.text.to_lowercase();

        let exclusion_hits: u32 = EXCLUSION_CUES
            .iter()
            .map(|c| lower.matches(c).count() as u32)
            .sum();
        let coverage_hits: u32 = COVERAGE_CUES
            .iter()
            .map(|c| lower.matches(c).count() as u32)
            .sum();

        let polarity = if coverage_hits > 0 && exclusion_hits == 0 {
            Polarity::Grant
        } else if exclusion_hits > coverage_hits {
            Polarity::Remove
        } else {
            Polarity::Neutral
        };

        let has_conditional = CONDITIONAL_CONJUNCTIONS
            .iter()
            .any(|c| lower.contains(c));
        let has_discretionary = DISCRETIONARY_VERBS.iter().any(|c| lower.contains(c));

        let strictness = if has_discretionary {
            Strictness::Discretionary
        } else if has_conditional {
            Strictness::Conditional
        } else {
            Strictness::Absolute
        };

        let burden_shift = BURDEN_SHIFT_CUES.iter().any(|c| lower.contains(c));

        let entities: BTreeSet<String> = ENTITY_LEXICON
            .iter()
            .filter(|e| lower.contains(*e))
            .map(|e| e.to_string())
            .collect();

        let scope_connectors: BTreeSet<String> = SCOPE_CONNECTORS
            .iter()
            .filter(|c| lower.contains(*c))
            .map(|c| c.to_string())
            .collect();

        let carve_outs = extract_carve_outs(&block.text);

        let mut numerics: BTreeMap<String, f64> = BTreeMap::new();
        for m in currency_re().find_iter(&lower) {
            if let Some(caps) = currency_re().captures(m.as_str()) {
                if let Some(num) = caps.get(1) {
                    if let Ok(value) = num.as_str().replace(',', "").parse::<f64>() {
                        let field = canonical_numeric_field(&lower, m.start());
                        numerics.entry(field.to_string()).or_insert(value);
                    }
                }
            }
        }
        for caps in percentage_re().captures_iter(&lower) {
            if let Ok(value) = caps[1].parse::<f64>() {
                numerics.entry("percentage".to_string()).or_insert(value / 100.0);
            }
        }

        let mut temporal = None;
        if let Some(caps) = duration_re().captures(&lower) {
            if let Ok(value) = caps[1].parse::<f64>() {
                let unit = match &caps[2] {
                    u if u.starts_with("day") => TemporalUnit::Days,
                    u if u.starts_with("month") => TemporalUnit::Months,
                    _ => TemporalUnit::Years,
                };
                numerics.entry("period".to_string()).or_insert(value);
                temporal = Some(TemporalRange { value, unit });
            }
        }

        ClauseDna {
            polarity,
            strictness,
            entities,
            carve_outs,
            scope_connectors,
            burden_shift,
            temporal,
            numerics,
        }
    }
}

fn extract_carve_outs(text: &str) -> BTreeSet<String> {
    let lower = text.to_lowercase();
    let mut out = BTreeSet::new();
    for trigger in CARVE_OUT_TRIGGERS {
        let mut search_from = 0;
        while let Some(pos) = lower[search_from..].find(trigger) {
            let abs = search_from + pos + trigger.len();
            let rest = &text[abs.min(text.len())..];
            let end = rest.find('.').unwrap_or(rest.len());
            let span = rest[..end].trim();
            if !span.is_empty() {
                out.insert(span.to_lowercase());
            }
            search_from = abs;
            if search_from >= lower.len() {
                break;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(text: &str) -> Block {
        Block::new("doc1", 0, text, 1, 1, vec![])
    }

    #[test]
    fn grant_polarity_for_coverage_only() {
        let dna = DnaExtractor.extract(&block("We will pay for theft."));
        assert_eq!(dna.polarity, Polarity::Grant);
        assert_eq!(dna.strictness, Strictness::Absolute);
    }

    #[test]
    fn remove_polarity_for_exclusion() {
        let dna = DnaExtractor.extract(&block("This policy excluded flood damage."));
        assert_eq!(dna.polarity, Polarity::Remove);
    }

    #[test]
    fn conditional_strictness_when_provided_that_present() {
        let dna = DnaExtractor.extract(&block(
            "We will pay for theft, provided a police report is filed within 48 hours.",
        ));
        assert_eq!(dna.strictness, Strictness::Conditional);
        assert_eq!(dna.numerics.get("period"), Some(&48.0));
    }

    #[test]
    fn discretionary_strictness_when_may_present() {
        let dna = DnaExtractor.extract(&block("We may, at our discretion, pay for damage."));
        assert_eq!(dna.strictness, Strictness::Discretionary);
    }

    #[test]
    fn limit_numeric_parsed_near_keyword() {
        let dna = DnaExtractor.extract(&block("Limit of liability: $10,000,000."));
        assert_eq!(dna.numerics.get("limit"), Some(&10_000_000.0));
    }

    #[test]
    fn deductible_numeric_parsed_near_excess_keyword() {
        let dna = DnaExtractor.extract(&block("The excess payable is $500."));
        assert_eq!(dna.numerics.get("deductible"), Some(&500.0));
    }

    #[test]
    fn carve_out_extracted_up_to_sentence_boundary() {
        let dna = DnaExtractor.extract(&block(
            "Cover applies to all loss except flood damage. Other terms apply.",
        ));
        assert!(dna.carve_outs.contains("flood damage"));
    }

    #[test]
    fn entities_and_connectors_use_fixed_lexicon() {
        let dna = DnaExtractor.extract(&block(
            "We will pay the insured for loss arising from theft by a third party.",
        ));
        assert!(dna.entities.contains("insured"));
        assert!(dna.entities.contains("third party"));
        assert!(dna.scope_connectors.contains("arising from"));
    }
}
