//! `Aligner` (`spec.md` §4.6): candidate generation plus a constrained
//! one-to-one assignment between document A's and document B's clauses.
//!
//! Grounded on `ob-workflow::engine`'s guard-then-apply control flow (score
//! candidates, then commit a transition only if still legal) — here,
//! "still legal" means "both endpoints still free". `rustc-hash` backs the
//! free/assigned bookkeeping the way the `drift` pack uses it for large
//! candidate sets.

pub mod similarity;

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;

use ucc_core::config::UccConfig;
use ucc_core::error::{AlignError, Result};
use ucc_core::ports::Embedder;
use ucc_core::types::{
    Clause, ClauseMatch, Evidence, MatchStatus, PageRange, UnmappedBlock, UnmappedReason,
};
use ucc_extract::DefinitionResolver;

use similarity::{cosine, dna_sim, section_sim};

/// Lower bound below which an edge is never proposed at all — `spec.md` §9's
/// Open Question resolution: edges in `[0.55, similarity_threshold)` are kept
/// as low-confidence `modified` matches; below 0.55 the clauses simply don't
/// match and fall through to added/removed.
const MIN_CANDIDATE_SIM: f64 = 0.55;

/// `sim(a,b) == 1.0 - eps` is treated as `unchanged`, per `spec.md` §4.6.
const UNCHANGED_EPS: f64 = 1e-4;

pub struct AlignmentOutput {
    pub matches: Vec<ClauseMatch>,
    pub unmapped_a: Vec<UnmappedBlock>,
    pub unmapped_b: Vec<UnmappedBlock>,
    pub warnings: Vec<String>,
}

pub struct Aligner;

impl Aligner {
    /// Aligns the non-admin clauses of A against B. Admin clauses are
    /// expected to already be excluded from `a_clauses`/`b_clauses` by the
    /// caller's filtering, OR may be passed in directly — this function
    /// separates them out defensively either way.
    pub async fn align(
        &self,
        a_clauses: &[Clause],
        b_clauses: &[Clause],
        a_defs: &BTreeMap<String, String>,
        b_defs: &BTreeMap<String, String>,
        embedder: &dyn Embedder,
        config: &UccConfig,
    ) -> Result<AlignmentOutput> {
        let mut warnings = Vec::new();

        let mut unmapped_a = Vec::new();
        let mut unmapped_b = Vec::new();

        let a_active: Vec<&Clause> = a_clauses
            .iter()
            .filter(|c| {
                if c.block.is_admin {
                    unmapped_a.push(UnmappedBlock {
                        block_id: c.block.block_id.clone(),
                        reason: UnmappedReason::Admin,
                    });
                    false
                } else {
                    true
                }
            })
            .collect();
        let b_active: Vec<&Clause> = b_clauses
            .iter()
            .filter(|c| {
                if c.block.is_admin {
                    unmapped_b.push(UnmappedBlock {
                        block_id: c.block.block_id.clone(),
                        reason: UnmappedReason::Admin,
                    });
                    false
                } else {
                    true
                }
            })
            .collect();

        if a_active.is_empty() && b_active.is_empty() {
            return Ok(AlignmentOutput {
                matches: Vec::new(),
                unmapped_a,
                unmapped_b,
                warnings,
            });
        }

        let a_texts: Vec<String> = a_active
            .iter()
            .map(|c| DefinitionResolver::expand(&c.block.text, a_defs))
            .collect();
        let b_texts: Vec<String> = b_active
            .iter()
            .map(|c| DefinitionResolver::expand(&c.block.text, b_defs))
            .collect();

        let embeddings = match (
            embedder.embed_batch(&a_texts).await,
            embedder.embed_batch(&b_texts).await,
        ) {
            (Ok(a), Ok(b)) => Some((a, b)),
            _ => {
                warnings.push("embedder fallback: lexical similarity".to_string());
                None
            }
        };

        let cos = |i: usize, j: usize| -> f64 {
            match &embeddings {
                Some((a_emb, b_emb)) => cosine(&a_emb[i], &b_emb[j]),
                None => lexical_jaccard(&a_texts[i], &b_texts[j]),
            }
        };

        // Candidate edges, grouped by A index, top-K per `spec.md` §4.6.
        let mut edges: Vec<(usize, usize, f64)> = Vec::new();
        for (i, a) in a_active.iter().enumerate() {
            let mut scored: Vec<(usize, f64)> = b_active
                .iter()
                .enumerate()
                .map(|(j, b)| {
                    let raw = 0.6 * cos(i, j) + 0.2 * dna_sim(&a.dna, &b.dna)
                        + 0.2 * section_sim(&a.block.section_path, &b.block.section_path);
                    let gated = if a.clause_type != b.clause_type {
                        raw * 0.5
                    } else {
                        raw
                    };
                    (j, gated)
                })
                .filter(|(_, s)| *s >= MIN_CANDIDATE_SIM)
                .collect();
            scored.sort_by(|x, y| {
                y.1.partial_cmp(&x.1)
                    .unwrap()
                    .then_with(|| x.0.cmp(&y.0))
            });
            scored.truncate(config.max_candidates_per_clause);
            for (j, sim) in scored {
                edges.push((i, j, sim));
            }
        }

        // Deterministic greedy max-weight one-to-one assignment: descending
        // sim, then ascending a sequence number, then ascending b sequence
        // number (`spec.md` §4.6).
        edges.sort_by(|x, y| {
            y.2.partial_cmp(&x.2)
                .unwrap()
                .then_with(|| x.0.cmp(&y.0))
                .then_with(|| x.1.cmp(&y.1))
        });

        let mut a_taken: FxHashSet<usize> = FxHashSet::default();
        let mut b_taken: FxHashSet<usize> = FxHashSet::default();
        let mut assigned: Vec<(usize, usize, f64)> = Vec::new();
        for (i, j, sim) in edges {
            if a_taken.contains(&i) || b_taken.contains(&j) {
                continue;
            }
            a_taken.insert(i);
            b_taken.insert(j);
            assigned.push((i, j, sim));
        }

        let mut matches = Vec::new();
        for (i, j, sim) in assigned {
            let a = a_active[i];
            let b = b_active[j];
            let status = if sim >= 1.0 - UNCHANGED_EPS {
                MatchStatus::Unchanged
            } else {
                MatchStatus::Modified
            };
            matches.push(blank_match(
                Some(a.block.block_id.clone()),
                Some(b.block.block_id.clone()),
                status,
                Some(sim.clamp(0.0, 1.0)),
                Evidence {
                    a: Some(PageRange {
                        page_start: a.block.page_start,
                        page_end: a.block.page_end,
                    }),
                    b: Some(PageRange {
                        page_start: b.block.page_start,
                        page_end: b.block.page_end,
                    }),
                },
                b.clause_type,
            ));
        }

        for (i, a) in a_active.iter().enumerate() {
            if !a_taken.contains(&i) {
                matches.push(blank_match(
                    Some(a.block.block_id.clone()),
                    None,
                    MatchStatus::Removed,
                    None,
                    Evidence {
                        a: Some(PageRange {
                            page_start: a.block.page_start,
                            page_end: a.block.page_end,
                        }),
                        b: None,
                    },
                    a.clause_type,
                ));
            }
        }
        for (j, b) in b_active.iter().enumerate() {
            if !b_taken.contains(&j) {
                matches.push(blank_match(
                    None,
                    Some(b.block.block_id.clone()),
                    MatchStatus::Added,
                    None,
                    Evidence {
                        a: None,
                        b: Some(PageRange {
                            page_start: b.block.page_start,
                            page_end: b.block.page_end,
                        }),
                    },
                    b.clause_type,
                ));
            }
        }

        for m in &matches {
            if !m.check_invariants() {
                return Err(AlignError::InvariantViolation(format!(
                    "match {:?} violates its own status/evidence/similarity invariants",
                    m
                ))
                .into());
            }
        }

        Ok(AlignmentOutput {
            matches,
            unmapped_a,
            unmapped_b,
            warnings,
        })
    }
}

fn blank_match(
    a_id: Option<String>,
    b_id: Option<String>,
    status: MatchStatus,
    similarity: Option<f64>,
    evidence: Evidence,
    clause_type: ucc_core::types::ClauseType,
) -> ClauseMatch {
    ClauseMatch {
        a_id,
        b_id,
        status,
        similarity,
        token_diff: None,
        numeric_delta: BTreeMap::new(),
        materiality_score: 0.0,
        strictness_delta: 0,
        review_required: false,
        evidence,
        clause_type,
    }
}

fn lexical_jaccard(a: &str, b: &str) -> f64 {
    let tokenize = |s: &str| -> FxHashSet<String> {
        s.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_string())
            .collect()
    };
    let ta = tokenize(a);
    let tb = tokenize(b);
    if ta.is_empty() && tb.is_empty() {
        return 1.0;
    }
    let intersection = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ucc_core::error::{Result as UccResult, UccError};
    use ucc_core::types::{Block, ClauseType};

    fn clause(doc: &str, seq: usize, text: &str, ctype: ClauseType) -> Clause {
        Clause {
            block: Block::new(doc, seq, text, 1, 1, vec![]),
            clause_type: ctype,
            dna: Default::default(),
        }
    }

    struct EchoEmbedder;

    #[async_trait]
    impl Embedder for EchoEmbedder {
        fn model_id(&self) -> &str {
            "echo"
        }
        async fn embed(&self, text: &str) -> UccResult<Vec<f32>> {
            Ok(vec![text.len() as f32, 1.0])
        }
        async fn embed_batch(&self, texts: &[String]) -> UccResult<Vec<Vec<f32>>> {
            let mut out = Vec::new();
            for t in texts {
                out.push(self.embed(t).await?);
            }
            Ok(out)
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn model_id(&self) -> &str {
            "failing"
        }
        async fn embed(&self, _text: &str) -> UccResult<Vec<f32>> {
            Err(UccError::EmbeddingTransient("down".into()))
        }
        async fn embed_batch(&self, _texts: &[String]) -> UccResult<Vec<Vec<f32>>> {
            Err(UccError::EmbeddingTransient("down".into()))
        }
    }

    #[tokio::test]
    async fn identical_clauses_become_unchanged() {
        let a = vec![clause("a", 0, "We will pay for theft.", ClauseType::Coverage)];
        let b = vec![clause("b", 0, "We will pay for theft.", ClauseType::Coverage)];
        let out = Aligner
            .align(&a, &b, &BTreeMap::new(), &BTreeMap::new(), &EchoEmbedder, &UccConfig::default())
            .await
            .unwrap();
        assert_eq!(out.matches.len(), 1);
        assert_eq!(out.matches[0].status, MatchStatus::Unchanged);
        assert_eq!(out.matches[0].similarity, Some(1.0));
    }

    #[tokio::test]
    async fn pure_addition_leaves_extra_b_clause_added() {
        let a = vec![clause("a", 0, "We will pay for theft.", ClauseType::Coverage)];
        let b = vec![
            clause("b", 0, "We will pay for theft.", ClauseType::Coverage),
            clause("b", 1, "We will pay for flood damage too.", ClauseType::Coverage),
        ];
        let out = Aligner
            .align(&a, &b, &BTreeMap::new(), &BTreeMap::new(), &EchoEmbedder, &UccConfig::default())
            .await
            .unwrap();
        let added: Vec<_> = out
            .matches
            .iter()
            .filter(|m| m.status == MatchStatus::Added)
            .collect();
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].a_id, None);
        assert!(added[0].b_id.is_some());
    }

    #[tokio::test]
    async fn admin_blocks_never_enter_matches() {
        let mut admin = clause("a", 0, "Policy number 12345.", ClauseType::Admin);
        admin.block.is_admin = true;
        let a = vec![admin];
        let b = vec![clause("b", 0, "We will pay for theft.", ClauseType::Coverage)];
        let out = Aligner
            .align(&a, &b, &BTreeMap::new(), &BTreeMap::new(), &EchoEmbedder, &UccConfig::default())
            .await
            .unwrap();
        assert_eq!(out.unmapped_a.len(), 1);
        assert_eq!(out.unmapped_a[0].reason, UnmappedReason::Admin);
        assert!(out.matches.iter().all(|m| m.a_id.as_deref() != Some("a:0")));
    }

    #[tokio::test]
    async fn embedder_failure_falls_back_to_lexical_similarity() {
        let a = vec![clause("a", 0, "We will pay for theft of property.", ClauseType::Coverage)];
        let b = vec![clause("b", 0, "We will pay for theft of property.", ClauseType::Coverage)];
        let out = Aligner
            .align(&a, &b, &BTreeMap::new(), &BTreeMap::new(), &FailingEmbedder, &UccConfig::default())
            .await
            .unwrap();
        assert!(out
            .warnings
            .iter()
            .any(|w| w == "embedder fallback: lexical similarity"));
        assert_eq!(out.matches.len(), 1);
        assert_eq!(out.matches[0].status, MatchStatus::Unchanged);
    }

    #[tokio::test]
    async fn empty_documents_succeed_with_no_matches() {
        let out = Aligner
            .align(&[], &[], &BTreeMap::new(), &BTreeMap::new(), &EchoEmbedder, &UccConfig::default())
            .await
            .unwrap();
        assert!(out.matches.is_empty());
    }
}
