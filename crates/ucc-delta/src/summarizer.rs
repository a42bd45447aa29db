//! `Summarizer` (`spec.md` §4.8) plus the final `matches` ordering described
//! at the end of `spec.md` §4.6 (it depends on `materiality_score`, which
//! only exists once `DeltaInterpreter` has run, so it lives here).

use std::collections::HashMap;

use ucc_core::types::{Clause, ClauseMatch, Counts, MatchStatus, Summary};

const MAX_BULLETS: usize = 12;

pub struct Summarizer;

impl Summarizer {
    /// Final order: status rank (modified=0, added=1, removed=2,
    /// unchanged=3), then materiality_score descending, then page_start of
    /// the surviving side.
    pub fn order_matches(&self, mut matches: Vec<ClauseMatch>) -> Vec<ClauseMatch> {
        matches.sort_by(|a, b| {
            a.status
                .sort_rank()
                .cmp(&b.status.sort_rank())
                .then_with(|| {
                    b.materiality_score
                        .partial_cmp(&a.materiality_score)
                        .unwrap()
                })
                .then_with(|| surviving_page_start(a).cmp(&surviving_page_start(b)))
        });
        matches
    }

    pub fn summarize(
        &self,
        matches: &[ClauseMatch],
        a_by_id: &HashMap<String, &Clause>,
        b_by_id: &HashMap<String, &Clause>,
    ) -> Summary {
        let mut counts = Counts::default();
        for m in matches {
            match m.status {
                MatchStatus::Added => counts.added += 1,
                MatchStatus::Removed => counts.removed += 1,
                MatchStatus::Modified => counts.modified += 1,
                MatchStatus::Unchanged => counts.unchanged += 1,
            }
        }

        let mut ranked: Vec<&ClauseMatch> = matches.iter().collect();
        ranked.sort_by(|a, b| {
            b.materiality_score
                .partial_cmp(&a.materiality_score)
                .unwrap()
                .then_with(|| a.status.sort_rank().cmp(&b.status.sort_rank()))
                .then_with(|| surviving_page_start(a).cmp(&surviving_page_start(b)))
        });

        let bullets = ranked
            .into_iter()
            .take(MAX_BULLETS)
            .filter_map(|m| bullet_for(m, a_by_id, b_by_id))
            .collect();

        Summary { counts, bullets }
    }
}

fn surviving_page_start(m: &ClauseMatch) -> u32 {
    m.evidence
        .b
        .as_ref()
        .or(m.evidence.a.as_ref())
        .map(|p| p.page_start)
        .unwrap_or(u32::MAX)
}

fn short_title(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= 80 {
        trimmed.to_string()
    } else {
        let truncated: String = trimmed.chars().take(80).collect();
        format!("{truncated}...")
    }
}

fn bullet_for(
    m: &ClauseMatch,
    a_by_id: &HashMap<String, &Clause>,
    b_by_id: &HashMap<String, &Clause>,
) -> Option<String> {
    match m.status {
        MatchStatus::Unchanged => None,
        MatchStatus::Added => {
            let b = m.b_id.as_ref().and_then(|id| b_by_id.get(id))?;
            Some(format!(
                "Added {}: {} (p.{})",
                m.clause_type,
                short_title(&b.block.text),
                b.block.page_start
            ))
        }
        MatchStatus::Removed => {
            let a = m.a_id.as_ref().and_then(|id| a_by_id.get(id))?;
            Some(format!(
                "Removed {}: {} (p.{})",
                m.clause_type,
                short_title(&a.block.text),
                a.block.page_start
            ))
        }
        MatchStatus::Modified => {
            let a = m.a_id.as_ref().and_then(|id| a_by_id.get(id));
            let b = m.b_id.as_ref().and_then(|id| b_by_id.get(id));
            let reason = modified_reason(m, a.copied(), b.copied());
            Some(format!("Modified {}: {}", m.clause_type, reason))
        }
    }
}

fn modified_reason(m: &ClauseMatch, a: Option<&Clause>, b: Option<&Clause>) -> String {
    if let (Some(a), Some(b)) = (a, b) {
        if a.dna.polarity != b.dna.polarity {
            return if b.dna.polarity == ucc_core::types::Polarity::Remove {
                "became exclusion".to_string()
            } else {
                "became coverage".to_string()
            };
        }
    }
    if m.strictness_delta < 0 {
        return "now more restrictive".to_string();
    }
    if m.strictness_delta > 0 {
        return "now less restrictive".to_string();
    }
    if let Some((field, entry)) = m
        .numeric_delta
        .iter()
        .filter(|(_, e)| e.delta_pct.is_some())
        .max_by(|x, y| {
            x.1.delta_pct
                .unwrap()
                .abs()
                .partial_cmp(&y.1.delta_pct.unwrap().abs())
                .unwrap()
        })
    {
        return format!(
            "{field} changed from {} to {}",
            format_numeric(entry.a_value),
            format_numeric(entry.b_value)
        );
    }
    "wording changed".to_string()
}

fn format_numeric(v: Option<f64>) -> String {
    match v {
        Some(n) if n.fract() == 0.0 => format!("{n:.0}"),
        Some(n) => format!("{n}"),
        None => "?".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use ucc_core::types::{Block, ClauseDna, ClauseType, Evidence, NumericDeltaEntry, PageRange};

    fn clause(doc: &str, text: &str, dna: ClauseDna) -> Clause {
        Clause {
            block: Block::new(doc, 0, text, 3, 3, vec![]),
            clause_type: ClauseType::Coverage,
            dna,
        }
    }

    fn make_match(status: MatchStatus, materiality: f64, page: u32) -> ClauseMatch {
        ClauseMatch {
            a_id: Some("a1".to_string()),
            b_id: Some("b1".to_string()),
            status,
            similarity: Some(0.9),
            token_diff: None,
            numeric_delta: BTreeMap::new(),
            materiality_score: materiality,
            strictness_delta: 0,
            review_required: false,
            evidence: Evidence {
                a: Some(PageRange { page_start: page, page_end: page }),
                b: Some(PageRange { page_start: page, page_end: page }),
            },
            clause_type: ClauseType::Coverage,
        }
    }

    #[test]
    fn counts_sum_to_total_matches() {
        let matches = vec![
            make_match(MatchStatus::Added, 0.9, 1),
            make_match(MatchStatus::Removed, 0.8, 2),
            make_match(MatchStatus::Modified, 0.5, 3),
            make_match(MatchStatus::Unchanged, 0.0, 4),
        ];
        let summary = Summarizer.summarize(&matches, &HashMap::new(), &HashMap::new());
        let total = summary.counts.added + summary.counts.removed + summary.counts.modified + summary.counts.unchanged;
        assert_eq!(total, matches.len());
    }

    #[test]
    fn order_matches_ranks_modified_before_added_before_removed_before_unchanged() {
        let matches = vec![
            make_match(MatchStatus::Unchanged, 0.0, 1),
            make_match(MatchStatus::Removed, 0.9, 2),
            make_match(MatchStatus::Added, 0.9, 3),
            make_match(MatchStatus::Modified, 0.1, 4),
        ];
        let ordered = Summarizer.order_matches(matches);
        let ranks: Vec<u8> = ordered.iter().map(|m| m.status.sort_rank()).collect();
        assert_eq!(ranks, vec![0, 1, 2, 3]);
    }

    #[test]
    fn identical_documents_produce_no_bullets() {
        let matches = vec![make_match(MatchStatus::Unchanged, 0.0, 1)];
        let summary = Summarizer.summarize(&matches, &HashMap::new(), &HashMap::new());
        assert!(summary.bullets.is_empty());
    }

    #[test]
    fn modified_bullet_reports_numeric_change() {
        let dna_a = ClauseDna::default();
        let dna_b = ClauseDna::default();
        let a = clause("a", "Limit of liability: $10,000,000.", dna_a);
        let b = clause("b", "Limit of liability: $5,000,000.", dna_b);
        let mut m = make_match(MatchStatus::Modified, 0.4, 3);
        m.a_id = Some(a.block.block_id.clone());
        m.b_id = Some(b.block.block_id.clone());
        m.numeric_delta.insert(
            "limit".to_string(),
            NumericDeltaEntry { a_value: Some(10_000_000.0), b_value: Some(5_000_000.0), delta_pct: Some(-50.0) },
        );
        let mut a_map = HashMap::new();
        a_map.insert(a.block.block_id.clone(), &a);
        let mut b_map = HashMap::new();
        b_map.insert(b.block.block_id.clone(), &b);
        let summary = Summarizer.summarize(&[m], &a_map, &b_map);
        assert_eq!(summary.bullets.len(), 1);
        assert!(summary.bullets[0].contains("limit changed from 10000000 to 5000000"));
    }
}
