//! Error taxonomy for the Universal Clause Comparer.
//!
//! Mirrors the semantic kinds in the spec's error handling design: each
//! pipeline component raises one of these; the Orchestrator is the only
//! place that classifies and reacts (retry, fail, warn).

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum UccError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("embedding backend unavailable: {0}")]
    EmbeddingTransient(String),

    #[error("storage unavailable: {0}")]
    StorageTransient(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("operation timed out")]
    Timeout,

    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Align(#[from] AlignError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Structured failure modes raised by `ucc-extract` (layout extraction,
/// definition resolution, clause classification). Lives here rather than in
/// `ucc-extract` itself so `UccError` can aggregate it via `#[from]` without
/// a dependency cycle, mirroring `sem_os_core::error`'s habit of keeping
/// subsystem error detail next to the aggregate that wraps it.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("document has no extractable text layer")]
    NoExtractableText,
}

impl ExtractError {
    pub fn class(&self) -> ErrorClass {
        ErrorClass::Fatal
    }

    pub fn failure_reason(&self) -> &'static str {
        "parse_error"
    }

    pub fn http_status(&self) -> u16 {
        422
    }
}

/// Structured failure modes raised by `ucc-align` (candidate generation and
/// assignment).
#[derive(Debug, Error)]
pub enum AlignError {
    #[error("aligner produced an invalid clause match: {0}")]
    InvariantViolation(String),
}

impl AlignError {
    pub fn class(&self) -> ErrorClass {
        ErrorClass::Fatal
    }

    pub fn failure_reason(&self) -> &'static str {
        "internal_error"
    }

    pub fn http_status(&self) -> u16 {
        500
    }
}

/// Structured failure modes raised by `ucc-store`'s `JobStore`/`SegmentStore`
/// adapters (Postgres and in-memory).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database unavailable: {0}")]
    Unavailable(String),

    #[error("stored row could not be decoded: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Unavailable(_) => ErrorClass::Transient,
            Self::Decode(_) => ErrorClass::Fatal,
        }
    }

    pub fn failure_reason(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "storage",
            Self::Decode(_) => "internal_error",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::Unavailable(_) => 503,
            Self::Decode(_) => 500,
        }
    }
}

/// Structured failure modes raised by `ucc-orchestrator`'s job-chain
/// bookkeeping, distinct from the per-component errors it drives through.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("neither document contains an extractable text layer")]
    BothDocumentsUnparseable,

    #[error("submitted job {0} was not claimable immediately after creation")]
    JobNotClaimable(Uuid),

    #[error("job {0} finished without producing a result")]
    ResultMissing(Uuid),

    #[error("no in-memory documents held for job {0} (process restarted mid-job?)")]
    PendingDocumentsLost(Uuid),
}

impl OrchestratorError {
    pub fn class(&self) -> ErrorClass {
        ErrorClass::Fatal
    }

    pub fn failure_reason(&self) -> &'static str {
        match self {
            Self::BothDocumentsUnparseable => "parse_error",
            Self::JobNotClaimable(_) | Self::ResultMissing(_) | Self::PendingDocumentsLost(_) => {
                "internal_error"
            }
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::BothDocumentsUnparseable => 422,
            Self::JobNotClaimable(_) | Self::ResultMissing(_) | Self::PendingDocumentsLost(_) => {
                500
            }
        }
    }
}

/// Coarse retry/terminal classification used by the Orchestrator's retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Retryable: transient network/storage hiccup.
    Transient,
    /// Not retryable: bad input, programming error, exhausted timeout.
    Fatal,
    /// Cooperative stop, never retried.
    Cancelled,
}

impl UccError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::EmbeddingTransient(_) | Self::StorageTransient(_) => ErrorClass::Transient,
            Self::Cancelled => ErrorClass::Cancelled,
            Self::Extract(e) => e.class(),
            Self::Align(e) => e.class(),
            Self::Store(e) => e.class(),
            Self::Orchestrator(e) => e.class(),
            _ => ErrorClass::Fatal,
        }
    }

    /// The opaque machine-readable reason surfaced on a terminal `FAILED` job.
    pub fn failure_reason(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::Parse(_) => "parse_error",
            Self::EmbeddingTransient(_) => "embedding_unavailable",
            Self::StorageTransient(_) => "storage",
            Self::NotFound(_) => "not_found",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Extract(e) => e.failure_reason(),
            Self::Align(e) => e.failure_reason(),
            Self::Store(e) => e.failure_reason(),
            Self::Orchestrator(e) => e.failure_reason(),
            Self::Internal(_) => "internal_error",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidInput(_) => 400,
            Self::NotFound(_) => 404,
            Self::Timeout => 504,
            Self::Parse(_) => 422,
            Self::EmbeddingTransient(_) | Self::StorageTransient(_) => 503,
            Self::Cancelled => 409,
            Self::Extract(e) => e.http_status(),
            Self::Align(e) => e.http_status(),
            Self::Store(e) => e.http_status(),
            Self::Orchestrator(e) => e.http_status(),
            Self::Internal(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, UccError>;
