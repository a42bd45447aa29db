//! `DeltaInterpreter` (`spec.md` §4.7): per-`ClauseMatch` materiality,
//! strictness delta, review flag, token diff and numeric delta.
//!
//! Grounded on `ob-workflow::state`'s transition/scoring style: a pure
//! function from (old state, new state) to a score, here generalized to
//! (clause A, clause B) -> a weighted-sum score.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use ucc_core::config::UccConfig;
use ucc_core::lexicon::STOPWORDS;
use ucc_core::types::{
    Clause, ClauseDna, ClauseMatch, MatchStatus, NumericDeltaEntry, TokenDiff,
};

pub struct DeltaInterpreter;

impl DeltaInterpreter {
    /// `a_by_id`/`b_by_id` stand in for the arena lookup a real deployment
    /// does against `SegmentStore` — `ClauseMatch` itself only ever holds ids
    /// (`spec.md` §9's arena + id redesign note).
    pub fn interpret(
        &self,
        matches: Vec<ClauseMatch>,
        a_by_id: &HashMap<String, &Clause>,
        b_by_id: &HashMap<String, &Clause>,
        config: &UccConfig,
    ) -> Vec<ClauseMatch> {
        matches
            .into_iter()
            .map(|m| self.interpret_one(m, a_by_id, b_by_id, config))
            .collect()
    }

    fn interpret_one(
        &self,
        mut m: ClauseMatch,
        a_by_id: &HashMap<String, &Clause>,
        b_by_id: &HashMap<String, &Clause>,
        config: &UccConfig,
    ) -> ClauseMatch {
        let a = m.a_id.as_ref().and_then(|id| a_by_id.get(id)).copied();
        let b = m.b_id.as_ref().and_then(|id| b_by_id.get(id)).copied();

        let rank_a = a.map(|c| c.dna.strictness.rank());
        let rank_b = b.map(|c| c.dna.strictness.rank());

        m.strictness_delta = match (rank_a, rank_b) {
            (Some(ra), Some(rb)) => (rb - ra).clamp(-2, 2),
            (None, Some(rb)) => rb.clamp(-2, 2),
            (Some(ra), None) => (-ra).clamp(-2, 2),
            (None, None) => 0,
        };

        let empty_dna = ClauseDna::default();
        let dna_a = a.map(|c| &c.dna).unwrap_or(&empty_dna);
        let dna_b = b.map(|c| &c.dna).unwrap_or(&empty_dna);

        if m.status == MatchStatus::Modified {
            let text_a = a.map(|c| c.block.text.as_str()).unwrap_or("");
            let text_b = b.map(|c| c.block.text.as_str()).unwrap_or("");
            let tokens_a = tokenize(text_a);
            let tokens_b = tokenize(text_b);
            let removed: Vec<String> = tokens_a.difference(&tokens_b).cloned().collect();
            let added: Vec<String> = tokens_b.difference(&tokens_a).cloned().collect();
            let mut removed = removed;
            let mut added = added;
            removed.sort();
            added.sort();
            m.token_diff = Some(TokenDiff { added, removed });
        } else {
            m.token_diff = None;
        }

        m.numeric_delta = numeric_delta(dna_a, dna_b, matches!(m.status, MatchStatus::Added | MatchStatus::Removed), a.is_some(), b.is_some());

        let polarity_changed = match m.status {
            MatchStatus::Added | MatchStatus::Removed => true,
            MatchStatus::Modified | MatchStatus::Unchanged => dna_a.polarity != dna_b.polarity,
        };

        let polarity_change_component = if matches!(m.status, MatchStatus::Added | MatchStatus::Removed) {
            1.0
        } else if dna_a.polarity != dna_b.polarity {
            1.0
        } else {
            0.0
        };

        let strictness_change = (m.strictness_delta.unsigned_abs() as f64) / 2.0;

        let carve_out_change = if matches!(m.status, MatchStatus::Added | MatchStatus::Removed) {
            1.0
        } else {
            1.0 - jaccard(&dna_a.carve_outs, &dna_b.carve_outs)
        };

        let numeric_change = m
            .numeric_delta
            .values()
            .filter_map(|e| e.delta_pct)
            .map(|pct| (pct.abs() / 100.0).min(1.0))
            .fold(0.0, f64::max);

        let token_change = match m.status {
            MatchStatus::Added | MatchStatus::Removed => 1.0,
            MatchStatus::Unchanged => 0.0,
            MatchStatus::Modified => {
                if let Some(td) = &m.token_diff {
                    let tokens_a = tokenize(a.map(|c| c.block.text.as_str()).unwrap_or(""));
                    let tokens_b = tokenize(b.map(|c| c.block.text.as_str()).unwrap_or(""));
                    let denom = (tokens_a.len() + tokens_b.len()).max(1) as f64;
                    ((td.added.len() + td.removed.len()) as f64 / denom).min(1.0)
                } else {
                    0.0
                }
            }
        };

        let materiality = 0.35 * polarity_change_component
            + 0.25 * strictness_change
            + 0.20 * carve_out_change
            + 0.10 * numeric_change
            + 0.10 * token_change;
        m.materiality_score = materiality.clamp(0.0, 1.0);

        let low_confidence = m
            .similarity
            .map(|s| s >= 0.55 && s < config.similarity_threshold)
            .unwrap_or(false);

        let burden_shift_flipped = !dna_a.burden_shift && dna_b.burden_shift;

        let numeric_changed_25pct = m
            .numeric_delta
            .values()
            .filter_map(|e| e.delta_pct)
            .any(|pct| pct.abs() >= 25.0);

        m.review_required = m.materiality_score >= 0.7
            || polarity_changed
            || low_confidence
            || numeric_changed_25pct
            || burden_shift_flipped;

        m
    }
}

fn numeric_delta(
    a: &ClauseDna,
    b: &ClauseDna,
    one_sided: bool,
    a_present: bool,
    b_present: bool,
) -> BTreeMap<String, NumericDeltaEntry> {
    let _ = one_sided;
    let mut fields: BTreeSet<&String> = BTreeSet::new();
    if a_present {
        fields.extend(a.numerics.keys());
    }
    if b_present {
        fields.extend(b.numerics.keys());
    }
    fields
        .into_iter()
        .map(|field| {
            let a_value = if a_present { a.numerics.get(field).copied() } else { None };
            let b_value = if b_present { b.numerics.get(field).copied() } else { None };
            let delta_pct = match (a_value, b_value) {
                (Some(av), Some(bv)) if av != 0.0 => Some(((bv - av) / av) * 100.0),
                _ => None,
            };
            (
                field.clone(),
                NumericDeltaEntry {
                    a_value,
                    b_value,
                    delta_pct,
                },
            )
        })
        .collect()
}

fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Lowercase, strip punctuation, drop tokens shorter than 3, drop stopwords
/// (`spec.md` §4.7 token_diff).
fn tokenize(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 3 && !STOPWORDS.contains(t))
        .map(|t| t.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use ucc_core::types::{
        Block, ClauseType, Evidence, Polarity, Strictness,
    };

    fn clause(doc: &str, text: &str, dna: ClauseDna, ctype: ClauseType) -> Clause {
        Clause {
            block: Block::new(doc, 0, text, 1, 1, vec![]),
            clause_type: ctype,
            dna,
        }
    }

    fn base_match(a_id: Option<&str>, b_id: Option<&str>, status: MatchStatus, sim: Option<f64>) -> ClauseMatch {
        ClauseMatch {
            a_id: a_id.map(|s| s.to_string()),
            b_id: b_id.map(|s| s.to_string()),
            status,
            similarity: sim,
            token_diff: None,
            numeric_delta: BTreeMap::new(),
            materiality_score: 0.0,
            strictness_delta: 0,
            review_required: false,
            evidence: Evidence::default(),
            clause_type: ClauseType::Coverage,
        }
    }

    #[test]
    fn strictness_tighten_scenario_from_spec() {
        let mut dna_a = ClauseDna::default();
        dna_a.polarity = Polarity::Grant;
        dna_a.strictness = Strictness::Absolute;
        let mut dna_b = dna_a.clone();
        dna_b.strictness = Strictness::Conditional;
        dna_b.burden_shift = true;

        let a = clause("a", "We will pay for theft.", dna_a, ClauseType::Coverage);
        let b = clause(
            "b",
            "We will pay for theft, provided a police report is filed within 48 hours.",
            dna_b,
            ClauseType::Coverage,
        );
        let mut a_map = HashMap::new();
        a_map.insert(a.block.block_id.clone(), &a);
        let mut b_map = HashMap::new();
        b_map.insert(b.block.block_id.clone(), &b);

        let m = base_match(Some(&a.block.block_id), Some(&b.block.block_id), MatchStatus::Modified, Some(0.85));
        let out = DeltaInterpreter.interpret(vec![m], &a_map, &b_map, &UccConfig::default());
        assert_eq!(out[0].strictness_delta, -1);
        assert!(out[0].materiality_score >= 0.25);
        assert!(out[0].review_required);
    }

    #[test]
    fn polarity_flip_scenario_from_spec() {
        let mut dna_a = ClauseDna::default();
        dna_a.polarity = Polarity::Grant;
        let mut dna_b = ClauseDna::default();
        dna_b.polarity = Polarity::Remove;

        let a = clause("a", "Flood damage is covered.", dna_a, ClauseType::Coverage);
        let b = clause("b", "Flood damage is excluded.", dna_b, ClauseType::Exclusion);
        let mut a_map = HashMap::new();
        a_map.insert(a.block.block_id.clone(), &a);
        let mut b_map = HashMap::new();
        b_map.insert(b.block.block_id.clone(), &b);

        let m = base_match(Some(&a.block.block_id), Some(&b.block.block_id), MatchStatus::Modified, Some(0.8));
        let out = DeltaInterpreter.interpret(vec![m], &a_map, &b_map, &UccConfig::default());
        assert!(out[0].materiality_score >= 0.35);
        assert!(out[0].review_required);
    }

    #[test]
    fn numeric_change_scenario_from_spec() {
        let mut dna_a = ClauseDna::default();
        dna_a.numerics.insert("limit".to_string(), 10_000_000.0);
        let mut dna_b = ClauseDna::default();
        dna_b.numerics.insert("limit".to_string(), 5_000_000.0);

        let a = clause("a", "Limit of liability: $10,000,000.", dna_a, ClauseType::Coverage);
        let b = clause("b", "Limit of liability: $5,000,000.", dna_b, ClauseType::Coverage);
        let mut a_map = HashMap::new();
        a_map.insert(a.block.block_id.clone(), &a);
        let mut b_map = HashMap::new();
        b_map.insert(b.block.block_id.clone(), &b);

        let m = base_match(Some(&a.block.block_id), Some(&b.block.block_id), MatchStatus::Modified, Some(0.9));
        let out = DeltaInterpreter.interpret(vec![m], &a_map, &b_map, &UccConfig::default());
        let entry = out[0].numeric_delta.get("limit").unwrap();
        assert_eq!(entry.a_value, Some(10_000_000.0));
        assert_eq!(entry.b_value, Some(5_000_000.0));
        assert_eq!(entry.delta_pct, Some(-50.0));
        assert!(out[0].review_required);
    }

    #[test]
    fn unchanged_has_zero_materiality() {
        let dna = ClauseDna::default();
        let a = clause("a", "We will pay for theft.", dna.clone(), ClauseType::Coverage);
        let b = clause("b", "We will pay for theft.", dna, ClauseType::Coverage);
        let mut a_map = HashMap::new();
        a_map.insert(a.block.block_id.clone(), &a);
        let mut b_map = HashMap::new();
        b_map.insert(b.block.block_id.clone(), &b);

        let m = base_match(Some(&a.block.block_id), Some(&b.block.block_id), MatchStatus::Unchanged, Some(1.0));
        let out = DeltaInterpreter.interpret(vec![m], &a_map, &b_map, &UccConfig::default());
        assert_eq!(out[0].materiality_score, 0.0);
        assert!(!out[0].review_required);
    }

    #[test]
    fn low_confidence_edge_flags_review_required() {
        let dna = ClauseDna::default();
        let a = clause("a", "We will pay for theft.", dna.clone(), ClauseType::Coverage);
        let b = clause("b", "We will pay for theft of goods.", dna, ClauseType::Coverage);
        let mut a_map = HashMap::new();
        a_map.insert(a.block.block_id.clone(), &a);
        let mut b_map = HashMap::new();
        b_map.insert(b.block.block_id.clone(), &b);

        let m = base_match(Some(&a.block.block_id), Some(&b.block.block_id), MatchStatus::Modified, Some(0.6));
        let out = DeltaInterpreter.interpret(vec![m], &a_map, &b_map, &UccConfig::default());
        assert!(out[0].review_required);
    }
}
