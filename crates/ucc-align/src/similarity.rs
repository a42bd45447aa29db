//! Pure similarity components of `sim(a,b)` (`spec.md` §4.6). Kept separate
//! from embedding I/O so the DNA/section terms and the clause-type gate are
//! unit-testable without a network or model dependency.

use std::collections::BTreeSet;

use ucc_core::types::ClauseDna;

pub fn cosine(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)) as f64
}

pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
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

/// `dna_sim` = (polarity equal ? 0.4 : 0) + (1 - |rank_a - rank_b| / 2) * 0.3
/// + jaccard(entities) * 0.3.
pub fn dna_sim(a: &ClauseDna, b: &ClauseDna) -> f64 {
    let polarity_term = if a.polarity == b.polarity { 0.4 } else { 0.0 };
    let rank_diff = (a.strictness.rank() - b.strictness.rank()).unsigned_abs() as f64;
    let strictness_term = (1.0 - rank_diff / 2.0) * 0.3;
    let entity_term = jaccard(&a.entities, &b.entities) * 0.3;
    polarity_term + strictness_term + entity_term
}

/// `section_sim` = longest common prefix length of section paths / max(len_a, len_b).
pub fn section_sim(a: &[String], b: &[String]) -> f64 {
    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return 1.0;
    }
    let lcp = a
        .iter()
        .zip(b.iter())
        .take_while(|(x, y)| x == y)
        .count();
    lcp as f64 / max_len as f64
}
