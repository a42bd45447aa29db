//! The UCC data model (`spec.md` §3). All entities are immutable value
//! objects except `Job`, which the Orchestrator exclusively mutates.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Content hash of a document's raw bytes, hex-encoded. Stable identity for
/// dedup / segment cache keys.
pub fn doc_id_of(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Stable id for a block within a document: derived from `(doc_id, sequence_number)`.
pub fn block_id_of(doc_id: &str, sequence_number: usize) -> String {
    format!("{doc_id}:{sequence_number}")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub doc_id: String,
    pub file_name: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let doc_id = doc_id_of(&bytes);
        Self {
            doc_id,
            file_name: file_name.into(),
            bytes,
        }
    }
}

/// A 4-tuple bounding box: (x0, y0, x1, y1).
pub type BBox = (f64, f64, f64, f64);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub block_id: String,
    pub doc_id: String,
    pub sequence_number: usize,
    pub text: String,
    pub page_start: u32,
    pub page_end: u32,
    pub bbox: Option<BBox>,
    /// Outermost heading first; never empty — `["(root)"]` at minimum.
    pub section_path: Vec<String>,
    pub is_admin: bool,
}

impl Block {
    pub fn new(
        doc_id: &str,
        sequence_number: usize,
        text: impl Into<String>,
        page_start: u32,
        page_end: u32,
        section_path: Vec<String>,
    ) -> Self {
        assert!(page_start <= page_end, "page_start must be <= page_end");
        let section_path = if section_path.is_empty() {
            vec!["(root)".to_string()]
        } else {
            section_path
        };
        Self {
            block_id: block_id_of(doc_id, sequence_number),
            doc_id: doc_id.to_string(),
            sequence_number,
            text: text.into(),
            page_start,
            page_end,
            bbox: None,
            section_path,
            is_admin: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Definition {
    pub term_normalized: String,
    pub expansion: String,
    pub source_block_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClauseType {
    Coverage,
    Exclusion,
    Condition,
    Definition,
    Warranty,
    Extension,
    Endorsement,
    Subjectivity,
    Deductible,
    Admin,
}

impl ClauseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Coverage => "Coverage",
            Self::Exclusion => "Exclusion",
            Self::Condition => "Condition",
            Self::Definition => "Definition",
            Self::Warranty => "Warranty",
            Self::Extension => "Extension",
            Self::Endorsement => "Endorsement",
            Self::Subjectivity => "Subjectivity",
            Self::Deductible => "Deductible",
            Self::Admin => "Admin",
        }
    }
}

impl std::fmt::Display for ClauseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Polarity {
    Grant,
    Remove,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Strictness {
    Absolute,
    Conditional,
    Discretionary,
}

impl Strictness {
    /// ABSOLUTE=2, CONDITIONAL=1, DISCRETIONARY=0, per `spec.md` §4.6.
    pub fn rank(&self) -> i32 {
        match self {
            Self::Absolute => 2,
            Self::Conditional => 1,
            Self::Discretionary => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalRange {
    pub value: f64,
    pub unit: TemporalUnit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporalUnit {
    Days,
    Months,
    Years,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClauseDna {
    pub polarity: Polarity,
    pub strictness: Strictness,
    pub entities: BTreeSet<String>,
    pub carve_outs: BTreeSet<String>,
    pub scope_connectors: BTreeSet<String>,
    pub burden_shift: bool,
    pub temporal: Option<TemporalRange>,
    /// Canonical field name (e.g. `limit`, `deductible`, `percentage`,
    /// `period`, `other`) -> value in the canonical unit.
    pub numerics: BTreeMap<String, f64>,
}

impl Default for ClauseDna {
    fn default() -> Self {
        Self {
            polarity: Polarity::Neutral,
            strictness: Strictness::Absolute,
            entities: BTreeSet::new(),
            carve_outs: BTreeSet::new(),
            scope_connectors: BTreeSet::new(),
            burden_shift: false,
            temporal: None,
            numerics: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clause {
    pub block: Block,
    pub clause_type: ClauseType,
    pub dna: ClauseDna,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Added,
    Removed,
    Modified,
    Unchanged,
}

impl MatchStatus {
    /// modified=0, added=1, removed=2, unchanged=3, per `spec.md` §4.6 ordering.
    pub fn sort_rank(&self) -> u8 {
        match self {
            Self::Modified => 0,
            Self::Added => 1,
            Self::Removed => 2,
            Self::Unchanged => 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericDeltaEntry {
    pub a_value: Option<f64>,
    pub b_value: Option<f64>,
    pub delta_pct: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageRange {
    pub page_start: u32,
    pub page_end: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Evidence {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub a: Option<PageRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub b: Option<PageRange>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClauseMatch {
    pub a_id: Option<String>,
    pub b_id: Option<String>,
    pub status: MatchStatus,
    pub similarity: Option<f64>,
    pub token_diff: Option<TokenDiff>,
    /// canonical field -> {a_value, b_value, delta_pct}
    pub numeric_delta: BTreeMap<String, NumericDeltaEntry>,
    pub materiality_score: f64,
    pub strictness_delta: i32,
    pub review_required: bool,
    pub evidence: Evidence,
    pub clause_type: ClauseType,
}

impl ClauseMatch {
    /// Invariants from `spec.md` §8: exactly one of a_id/b_id null iff added/removed.
    pub fn check_invariants(&self) -> bool {
        let one_sided = self.a_id.is_none() != self.b_id.is_none();
        let both_present = self.a_id.is_some() && self.b_id.is_some();
        let status_ok = match self.status {
            MatchStatus::Added => self.a_id.is_none() && self.b_id.is_some(),
            MatchStatus::Removed => self.a_id.is_some() && self.b_id.is_none(),
            MatchStatus::Modified | MatchStatus::Unchanged => both_present,
        };
        let similarity_ok = match self.status {
            MatchStatus::Added | MatchStatus::Removed => self.similarity.is_none(),
            MatchStatus::Modified | MatchStatus::Unchanged => self.similarity.is_some(),
        };
        status_ok && similarity_ok && (one_sided || both_present)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Counts {
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
    pub unchanged: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Summary {
    pub counts: Counts,
    /// At most 12 human-readable bullets.
    pub bullets: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Timings {
    pub parse_a: u64,
    pub parse_b: u64,
    pub align: u64,
    pub diff: u64,
    pub total: u64,
}

/// Reason a block was deliberately excluded from matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmappedReason {
    Admin,
    UnderThreshold,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnmappedBlock {
    pub block_id: String,
    pub reason: UnmappedReason,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub summary: Summary,
    pub matches: Vec<ClauseMatch>,
    pub unmapped_a: Vec<UnmappedBlock>,
    pub unmapped_b: Vec<UnmappedBlock>,
    pub warnings: Vec<String>,
    pub timings_ms: Timings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Pending,
    Queued,
    Running,
    Retrying,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether `self -> next` is a legal transition per `spec.md` §4.10.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Queued)
                | (Queued, Running)
                | (Running, Retrying)
                | (Retrying, Running)
                | (Running, Completed)
                | (Running, Failed)
                | (Retrying, Failed)
                | (Pending, Cancelled)
                | (Queued, Cancelled)
                | (Running, Cancelled)
                | (Retrying, Cancelled)
        )
    }
}

pub const SEGMENT_NAMES: [&str; 12] = [
    "Queued",
    "A: Layout",
    "A: Definitions",
    "A: Classification",
    "A: DNA",
    "B: Layout",
    "B: Definitions",
    "B: Classification",
    "B: DNA",
    "Alignment",
    "Delta",
    "Summary",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: uuid::Uuid,
    pub doc_id_a: String,
    pub doc_id_b: String,
    pub file_name_a: String,
    pub file_name_b: String,
    pub status: JobStatus,
    pub current_segment: u8,
    pub current_segment_name: String,
    pub progress_pct: u8,
    pub error_message: Option<String>,
    pub result_pointer: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(doc_id_a: String, doc_id_b: String, file_name_a: String, file_name_b: String) -> Self {
        let now = Utc::now();
        Self {
            job_id: uuid::Uuid::new_v4(),
            doc_id_a,
            doc_id_b,
            file_name_a,
            file_name_b,
            status: JobStatus::Pending,
            current_segment: 0,
            current_segment_name: SEGMENT_NAMES[0].to_string(),
            progress_pct: 0,
            error_message: None,
            result_pointer: None,
            created_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_id_is_stable_content_hash() {
        let a = doc_id_of(b"hello");
        let b = doc_id_of(b"hello");
        let c = doc_id_of(b"world");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn block_defaults_section_path_to_root() {
        let b = Block::new("doc1", 0, "text", 1, 1, vec![]);
        assert_eq!(b.section_path, vec!["(root)".to_string()]);
    }

    #[test]
    fn strictness_rank_matches_spec() {
        assert_eq!(Strictness::Absolute.rank(), 2);
        assert_eq!(Strictness::Conditional.rank(), 1);
        assert_eq!(Strictness::Discretionary.rank(), 0);
    }

    #[test]
    fn match_status_sort_rank_matches_spec_ordering() {
        assert_eq!(MatchStatus::Modified.sort_rank(), 0);
        assert_eq!(MatchStatus::Added.sort_rank(), 1);
        assert_eq!(MatchStatus::Removed.sort_rank(), 2);
        assert_eq!(MatchStatus::Unchanged.sort_rank(), 3);
    }

    #[test]
    fn clause_match_invariants_hold_for_added() {
        let m = ClauseMatch {
            a_id: None,
            b_id: Some("b1".into()),
            status: MatchStatus::Added,
            similarity: None,
            token_diff: None,
            numeric_delta: BTreeMap::new(),
            materiality_score: 1.0,
            strictness_delta: 1,
            review_required: false,
            evidence: Evidence::default(),
            clause_type: ClauseType::Coverage,
        };
        assert!(m.check_invariants());
    }

    #[test]
    fn job_state_machine_rejects_illegal_transitions() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Queued));
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Completed));
        assert!(JobStatus::Completed.is_terminal());
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Running));
    }
}
