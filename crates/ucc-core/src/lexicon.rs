//! Fixed trigger-phrase lexicons shared by `ucc-extract`, `ucc-align` and
//! `ucc-delta`. Kept in `ucc-core` so every crate scores against the same
//! literal lists (`spec.md` §4.3/§4.4).

pub const EXCLUSION_CUES: &[&str] = &[
    "we will not pay",
    "excluded",
    "does not cover",
    "exclusion",
];

pub const CONDITION_CUES: &[&str] = &["you must", "it is a condition", "provided that"];

pub const WARRANTY_CUES: &[&str] = &["warranted that"];

pub const DEFINITION_CUES: &[&str] = &["means", "shall mean"];

pub const COVERAGE_CUES: &[&str] = &["we will pay", "we will indemnify", "cover is provided"];

pub const DEDUCTIBLE_CUES: &[&str] = &["excess", "deductible"];

pub const SUBJECTIVITY_CUES: &[&str] = &["subject to", "subjectivity"];

pub const CONDITIONAL_CONJUNCTIONS: &[&str] = &["unless", "provided that", "if", "except"];

pub const DISCRETIONARY_VERBS: &[&str] = &["may", "at our discretion", "we reserve"];

pub const CARVE_OUT_TRIGGERS: &[&str] = &["except", "other than", "save for", "but not"];

pub const SCOPE_CONNECTORS: &[&str] = &[
    "arising from",
    "caused by",
    "in respect of",
    "resulting from",
    "due to",
];

pub const ADMIN_SECTION_MARKERS: &[&str] = &[
    "schedule",
    "cover page",
    "policy schedule",
    "declaration",
    "index",
    "contact",
    "about us",
];

pub const STOPWORDS: &[&str] = &[
    "the", "and", "for", "that", "this", "with", "from", "are", "was", "were", "been", "has",
    "have", "had", "will", "shall", "any", "not", "such", "under", "upon", "also", "but", "out",
    "its", "our", "you", "your", "all",
];
