//! The 12-segment chain (`spec.md` §4.10), driven strictly sequentially per
//! job. Grounded on `ob-workflow::engine`'s guard-then-apply transitions
//! (check legality, then write) and `ob-workflow::listener`'s poll loop
//! (`POLL_INTERVAL_MS`/`ERROR_BACKOFF_MS`, `tokio::select!` shutdown),
//! generalized here to N workers each draining `JobStore::claim_next_queued`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{watch, RwLock};
use uuid::Uuid;

use ucc_align::Aligner;
use ucc_core::config::UccConfig;
use ucc_core::error::{ErrorClass, ExtractError, OrchestratorError, Result, UccError};
use ucc_core::ports::{Embedder, JobStore, JobUpdate, SegmentKind, SegmentStore};
use ucc_core::types::{
    Block, Clause, ComparisonResult, Document, Job, JobStatus, Timings, SEGMENT_NAMES,
};
use ucc_delta::{DeltaInterpreter, Summarizer};
use ucc_extract::{ClauseClassifier, DefinitionResolver, DnaExtractor, LayoutExtractor, PlainTextPageSource};

use crate::progress::{ProgressBus, ProgressFrame};
use crate::retry::backoff_for_attempt;

/// Queue-empty polling interval for `run_worker_loop`, mirroring the
/// teacher's `POLL_INTERVAL_MS`.
const POLL_INTERVAL_MS: u64 = 200;
/// Backoff after an unexpected error popping the queue, mirroring
/// `ERROR_BACKOFF_MS`.
const ERROR_BACKOFF_MS: u64 = 1000;

const LAST_SEGMENT: u8 = 11;

fn segment_name(id: u8) -> &'static str {
    SEGMENT_NAMES[id as usize]
}

fn segment_pct(id: u8) -> u8 {
    ((100u32 * id as u32) / LAST_SEGMENT as u32) as u8
}

/// Drives jobs end to end: owns the document bytes for a job's lifetime
/// (`spec.md` §5's "Document bytes: owned by the Orchestrator... deleted on
/// terminal transition"), the cooperative cancellation flags, and the
/// in-process retry counters (the `Job` row itself doesn't carry a retry
/// count — `spec.md` §4.9's schema has no such column, so it lives here,
/// scoped to this process the same way `Job`'s in-flight document bytes do).
pub struct Orchestrator {
    job_store: Arc<dyn JobStore>,
    segment_store: Arc<dyn SegmentStore>,
    embedder: Arc<dyn Embedder>,
    progress: Arc<ProgressBus>,
    config: UccConfig,
    pending_docs: RwLock<HashMap<Uuid, (Document, Document)>>,
    cancelled: RwLock<HashSet<Uuid>>,
    retry_counts: RwLock<HashMap<Uuid, u32>>,
}

enum Outcome {
    Done(ComparisonResult),
    Cancelled,
    Retry(UccError),
    Fatal(UccError),
}

impl Orchestrator {
    pub fn new(
        job_store: Arc<dyn JobStore>,
        segment_store: Arc<dyn SegmentStore>,
        embedder: Arc<dyn Embedder>,
        progress: Arc<ProgressBus>,
        config: UccConfig,
    ) -> Self {
        Self {
            job_store,
            segment_store,
            embedder,
            progress,
            config,
            pending_docs: RwLock::new(HashMap::new()),
            cancelled: RwLock::new(HashSet::new()),
            retry_counts: RwLock::new(HashMap::new()),
        }
    }

    /// Create a `Job` in `QUEUED` and stash the document bytes. Returns the
    /// new `job_id`; the job is not run until a worker claims it.
    pub async fn submit(
        &self,
        file_name_a: String,
        bytes_a: Vec<u8>,
        file_name_b: String,
        bytes_b: Vec<u8>,
    ) -> Result<Uuid> {
        let doc_a = Document::new(file_name_a, bytes_a);
        let doc_b = Document::new(file_name_b, bytes_b);
        let job = Job::new(
            doc_a.doc_id.clone(),
            doc_b.doc_id.clone(),
            doc_a.file_name.clone(),
            doc_b.file_name.clone(),
        );
        let job_id = job.job_id;
        self.job_store.create(job).await?;

        self.job_store
            .update(
                job_id,
                JobUpdate {
                    status: Some(JobStatus::Queued),
                    ..Default::default()
                },
            )
            .await?;
        self.pending_docs.write().await.insert(job_id, (doc_a, doc_b));
        Ok(job_id)
    }

    /// Submit and drive a job to completion in this call, for the
    /// synchronous `/ucc/compare` path and the CLI's one-shot mode. Requires
    /// that no other worker is concurrently draining the same `JobStore`.
    pub async fn submit_and_run(
        &self,
        file_name_a: String,
        bytes_a: Vec<u8>,
        file_name_b: String,
        bytes_b: Vec<u8>,
    ) -> Result<ComparisonResult> {
        let job_id = self
            .submit(file_name_a, bytes_a, file_name_b, bytes_b)
            .await?;
        let job = self
            .job_store
            .claim_next_queued()
            .await?
            .ok_or_else(|| OrchestratorError::JobNotClaimable(job_id))?;
        self.drive(job).await?;
        self.job_store
            .get_result(job_id)
            .await?
            .ok_or_else(|| OrchestratorError::ResultMissing(job_id).into())
    }

    /// Request cancellation. Cooperative: the flag is observed at the next
    /// segment boundary. Returns `false` if the job is already terminal or
    /// unknown.
    pub async fn request_cancel(&self, job_id: Uuid) -> Result<bool> {
        let job = self.job_store.get(job_id).await?;
        if job.status.is_terminal() {
            return Ok(false);
        }
        self.cancelled.write().await.insert(job_id);
        Ok(true)
    }

    /// One worker: repeatedly claims the next `QUEUED` job and drives it,
    /// polling when the queue is empty, until `shutdown` fires. Multiple
    /// workers run concurrently via `tokio::spawn`, per `UCC_WORKER_CONCURRENCY`.
    pub async fn run_worker_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("orchestrator worker started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            match self.job_store.claim_next_queued().await {
                Ok(Some(job)) => {
                    if let Err(e) = self.drive(job).await {
                        tracing::error!(error = %e, "job drive returned an error after finalizing");
                    }
                }
                Ok(None) => {
                    tokio::select! {
                        _ = tokio::time::sleep(std::time::Duration::from_millis(POLL_INTERVAL_MS)) => {}
                        _ = shutdown.changed() => {
                            if *shutdown.borrow() {
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "error claiming next queued job");
                    tokio::time::sleep(std::time::Duration::from_millis(ERROR_BACKOFF_MS)).await;
                }
            }
        }
        tracing::info!("orchestrator worker stopped");
    }

    /// Run the claimed `job` to a terminal state, honoring the hard timeout
    /// around the whole chain.
    pub async fn drive(&self, job: Job) -> Result<()> {
        let job_id = job.job_id;
        match tokio::time::timeout(self.config.job_hard_timeout, self.run_with_retries(job_id)).await {
            Ok(result) => result,
            Err(_elapsed) => {
                self.finalize_failed(job_id, &UccError::Timeout).await?;
                Err(UccError::Timeout)
            }
        }
    }

    async fn run_with_retries(&self, job_id: Uuid) -> Result<()> {
        loop {
            match self.attempt_chain(job_id).await {
                Outcome::Done(result) => return self.finalize_completed(job_id, result).await,
                Outcome::Cancelled => return self.finalize_cancelled(job_id).await,
                Outcome::Fatal(e) => {
                    self.finalize_failed(job_id, &e).await?;
                    return Err(e);
                }
                Outcome::Retry(e) => {
                    let attempt = {
                        let mut counts = self.retry_counts.write().await;
                        let entry = counts.entry(job_id).or_insert(0);
                        *entry += 1;
                        *entry
                    };
                    if attempt > self.config.max_retries {
                        self.finalize_failed(job_id, &e).await?;
                        return Err(e);
                    }
                    self.job_store
                        .update(
                            job_id,
                            JobUpdate {
                                status: Some(JobStatus::Retrying),
                                error_message: Some(Some(e.to_string())),
                                ..Default::default()
                            },
                        )
                        .await?;
                    self.progress
                        .publish(ProgressFrame::retrying(job_id, e.to_string()))
                        .await;
                    tokio::time::sleep(backoff_for_attempt(attempt, job_id)).await;
                    self.job_store
                        .update(
                            job_id,
                            JobUpdate {
                                status: Some(JobStatus::Running),
                                ..Default::default()
                            },
                        )
                        .await?;
                }
            }
        }
    }

    /// Runs all 11 working segments once. Transient failures (embedding,
    /// storage) and cancellation are captured as `Outcome` variants instead
    /// of propagated, so `run_with_retries` can decide what happens next;
    /// everything else bubbles up as `Outcome::Fatal`.
    async fn attempt_chain(&self, job_id: Uuid) -> Outcome {
        let total_start = Instant::now();
        let (doc_a, doc_b) = match self.pending_docs.read().await.get(&job_id).cloned() {
            Some(docs) => docs,
            None => return Outcome::Fatal(OrchestratorError::PendingDocumentsLost(job_id).into()),
        };

        let mut warnings = Vec::new();
        let mut parse_failed_a = false;
        let mut parse_failed_b = false;

        if self.is_cancelled(job_id).await {
            return Outcome::Cancelled;
        }

        // --- A: Layout / Definitions / Classification / DNA (segments 1-4) ---
        if let Err(e) = self.begin_segment(job_id, 1).await {
            return Outcome::classify(e);
        }
        let parse_start = Instant::now();
        let blocks_a = match self.extract_layout(&doc_a) {
            Ok(blocks) => blocks,
            Err(e @ UccError::Extract(ExtractError::NoExtractableText)) => {
                parse_failed_a = true;
                warnings.push(format!("parse error (document A): {e}"));
                Vec::new()
            }
            Err(e) => return Outcome::classify(e),
        };
        let parse_a_ms = parse_start.elapsed().as_millis() as u64;
        if let Err(e) = self
            .with_segment_timeout(self.segment_store.put(&doc_a.doc_id, SegmentKind::Blocks, json(&blocks_a)))
            .await
        {
            return Outcome::classify(e);
        }

        if self.is_cancelled(job_id).await {
            return Outcome::Cancelled;
        }
        if let Err(e) = self.begin_segment(job_id, 2).await {
            return Outcome::classify(e);
        }
        let defs_a = DefinitionResolver.resolve(&blocks_a);
        if let Err(e) = self
            .with_segment_timeout(self.segment_store.put(&doc_a.doc_id, SegmentKind::Definitions, json(&defs_a)))
            .await
        {
            return Outcome::classify(e);
        }
        let defs_a_map = DefinitionResolver::to_map(&defs_a);

        if self.is_cancelled(job_id).await {
            return Outcome::Cancelled;
        }
        if let Err(e) = self.begin_segment(job_id, 3).await {
            return Outcome::classify(e);
        }
        let classifier = ClauseClassifier;
        let types_a: Vec<_> = blocks_a.iter().map(|b| classifier.classify(b)).collect();

        if self.is_cancelled(job_id).await {
            return Outcome::Cancelled;
        }
        if let Err(e) = self.begin_segment(job_id, 4).await {
            return Outcome::classify(e);
        }
        let clauses_a = self.build_clauses(blocks_a, types_a);
        if let Err(e) = self
            .with_segment_timeout(self.segment_store.put(&doc_a.doc_id, SegmentKind::Clauses, json(&clauses_a)))
            .await
        {
            return Outcome::classify(e);
        }

        // --- B: Layout / Definitions / Classification / DNA (segments 5-8) ---
        if self.is_cancelled(job_id).await {
            return Outcome::Cancelled;
        }
        if let Err(e) = self.begin_segment(job_id, 5).await {
            return Outcome::classify(e);
        }
        let parse_start = Instant::now();
        let blocks_b = match self.extract_layout(&doc_b) {
            Ok(blocks) => blocks,
            Err(e @ UccError::Extract(ExtractError::NoExtractableText)) => {
                parse_failed_b = true;
                warnings.push(format!("parse error (document B): {e}"));
                Vec::new()
            }
            Err(e) => return Outcome::classify(e),
        };
        let parse_b_ms = parse_start.elapsed().as_millis() as u64;
        if let Err(e) = self
            .with_segment_timeout(self.segment_store.put(&doc_b.doc_id, SegmentKind::Blocks, json(&blocks_b)))
            .await
        {
            return Outcome::classify(e);
        }

        if parse_failed_a && parse_failed_b {
            return Outcome::Fatal(OrchestratorError::BothDocumentsUnparseable.into());
        }

        if self.is_cancelled(job_id).await {
            return Outcome::Cancelled;
        }
        if let Err(e) = self.begin_segment(job_id, 6).await {
            return Outcome::classify(e);
        }
        let defs_b = DefinitionResolver.resolve(&blocks_b);
        if let Err(e) = self
            .with_segment_timeout(self.segment_store.put(&doc_b.doc_id, SegmentKind::Definitions, json(&defs_b)))
            .await
        {
            return Outcome::classify(e);
        }
        let defs_b_map = DefinitionResolver::to_map(&defs_b);

        if self.is_cancelled(job_id).await {
            return Outcome::Cancelled;
        }
        if let Err(e) = self.begin_segment(job_id, 7).await {
            return Outcome::classify(e);
        }
        let types_b: Vec<_> = blocks_b.iter().map(|b| classifier.classify(b)).collect();

        if self.is_cancelled(job_id).await {
            return Outcome::Cancelled;
        }
        if let Err(e) = self.begin_segment(job_id, 8).await {
            return Outcome::classify(e);
        }
        let clauses_b = self.build_clauses(blocks_b, types_b);
        if let Err(e) = self
            .with_segment_timeout(self.segment_store.put(&doc_b.doc_id, SegmentKind::Clauses, json(&clauses_b)))
            .await
        {
            return Outcome::classify(e);
        }

        if clauses_a.iter().all(|c| c.block.is_admin)
            || clauses_b.iter().all(|c| c.block.is_admin)
        {
            warnings.push("empty document".to_string());
        }

        // --- Alignment (segment 9) ---
        if self.is_cancelled(job_id).await {
            return Outcome::Cancelled;
        }
        if let Err(e) = self.begin_segment(job_id, 9).await {
            return Outcome::classify(e);
        }
        let align_start = Instant::now();
        let aligner = Aligner;
        let alignment = match self
            .with_segment_timeout(aligner.align(
                &clauses_a,
                &clauses_b,
                &defs_a_map,
                &defs_b_map,
                self.embedder.as_ref(),
                &self.config,
            ))
            .await
        {
            Ok(out) => out,
            Err(e) => return Outcome::classify(e),
        };
        let align_ms = align_start.elapsed().as_millis() as u64;
        warnings.extend(alignment.warnings.clone());
        if let Err(e) = self
            .with_segment_timeout(self.segment_store.put(&job_id.to_string(), SegmentKind::Matches, json(&alignment.matches)))
            .await
        {
            return Outcome::classify(e);
        }

        // --- Delta (segment 10) ---
        if self.is_cancelled(job_id).await {
            return Outcome::Cancelled;
        }
        if let Err(e) = self.begin_segment(job_id, 10).await {
            return Outcome::classify(e);
        }
        let diff_start = Instant::now();
        let a_by_id: HashMap<String, &Clause> = clauses_a
            .iter()
            .map(|c| (c.block.block_id.clone(), c))
            .collect();
        let b_by_id: HashMap<String, &Clause> = clauses_b
            .iter()
            .map(|c| (c.block.block_id.clone(), c))
            .collect();
        let interpreter = DeltaInterpreter;
        let matches = interpreter.interpret(alignment.matches, &a_by_id, &b_by_id, &self.config);
        let diff_ms = diff_start.elapsed().as_millis() as u64;

        // --- Summary (segment 11) ---
        if self.is_cancelled(job_id).await {
            return Outcome::Cancelled;
        }
        if let Err(e) = self.begin_segment(job_id, 11).await {
            return Outcome::classify(e);
        }
        let summarizer = Summarizer;
        let ordered = summarizer.order_matches(matches);
        let summary = summarizer.summarize(&ordered, &a_by_id, &b_by_id);

        let total_ms = total_start.elapsed().as_millis() as u64;
        Outcome::Done(ComparisonResult {
            summary,
            matches: ordered,
            unmapped_a: alignment.unmapped_a,
            unmapped_b: alignment.unmapped_b,
            warnings,
            timings_ms: Timings {
                parse_a: parse_a_ms,
                parse_b: parse_b_ms,
                align: align_ms,
                diff: diff_ms,
                total: total_ms,
            },
        })
    }

    fn extract_layout(&self, doc: &Document) -> Result<Vec<Block>> {
        let extractor = LayoutExtractor::new(Box::new(PlainTextPageSource));
        extractor.extract(&doc.bytes, &doc.doc_id)
    }

    fn build_clauses(&self, blocks: Vec<Block>, types: Vec<ucc_core::types::ClauseType>) -> Vec<Clause> {
        let dna_extractor = DnaExtractor;
        blocks
            .into_iter()
            .zip(types)
            .map(|(mut block, clause_type)| {
                if clause_type == ucc_core::types::ClauseType::Admin {
                    block.is_admin = true;
                }
                let dna = if block.is_admin {
                    Default::default()
                } else {
                    dna_extractor.extract(&block)
                };
                Clause {
                    block,
                    clause_type,
                    dna,
                }
            })
            .collect()
    }

    async fn begin_segment(&self, job_id: Uuid, segment_id: u8) -> Result<()> {
        let name = segment_name(segment_id);
        let pct = segment_pct(segment_id);
        self.job_store
            .update(
                job_id,
                JobUpdate {
                    status: Some(JobStatus::Running),
                    current_segment: Some(segment_id),
                    current_segment_name: Some(name.to_string()),
                    progress_pct: Some(pct),
                    ..Default::default()
                },
            )
            .await?;
        self.progress
            .publish(ProgressFrame::progress(job_id, segment_id, name, pct))
            .await;
        Ok(())
    }

    async fn is_cancelled(&self, job_id: Uuid) -> bool {
        self.cancelled.read().await.contains(&job_id)
    }

    /// Wraps a single segment's I/O-bound work (store round-trips, embedding
    /// calls) with the per-segment soft timeout, mapping an elapsed deadline
    /// to `UccError::Timeout` so it folds into the same retry/fatal
    /// classification as any other segment error.
    async fn with_segment_timeout<F, T>(&self, fut: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.config.segment_soft_timeout, fut).await {
            Ok(result) => result,
            Err(_elapsed) => Err(UccError::Timeout),
        }
    }

    async fn finalize_completed(&self, job_id: Uuid, result: ComparisonResult) -> Result<()> {
        self.job_store.set_result(job_id, &result).await?;
        self.job_store
            .update(
                job_id,
                JobUpdate {
                    status: Some(JobStatus::Completed),
                    current_segment: Some(LAST_SEGMENT),
                    current_segment_name: Some(segment_name(LAST_SEGMENT).to_string()),
                    progress_pct: Some(100),
                    completed_at_now: true,
                    ..Default::default()
                },
            )
            .await?;
        self.progress
            .publish(ProgressFrame::terminal(job_id, JobStatus::Completed, None))
            .await;
        self.cleanup(job_id).await;
        Ok(())
    }

    async fn finalize_cancelled(&self, job_id: Uuid) -> Result<()> {
        self.job_store
            .update(
                job_id,
                JobUpdate {
                    status: Some(JobStatus::Cancelled),
                    completed_at_now: true,
                    ..Default::default()
                },
            )
            .await?;
        self.progress
            .publish(ProgressFrame::terminal(job_id, JobStatus::Cancelled, None))
            .await;
        self.cleanup(job_id).await;
        Ok(())
    }

    async fn finalize_failed(&self, job_id: Uuid, err: &UccError) -> Result<()> {
        let reason = if matches!(err, UccError::Internal(_)) {
            "internal_error".to_string()
        } else {
            err.failure_reason().to_string()
        };
        tracing::error!(job_id = %job_id, error = %err, "job failed");
        self.job_store
            .update(
                job_id,
                JobUpdate {
                    status: Some(JobStatus::Failed),
                    error_message: Some(Some(reason.clone())),
                    completed_at_now: true,
                    ..Default::default()
                },
            )
            .await?;
        self.progress
            .publish(ProgressFrame::terminal(job_id, JobStatus::Failed, Some(reason)))
            .await;
        self.cleanup(job_id).await;
        Ok(())
    }

    async fn cleanup(&self, job_id: Uuid) {
        self.pending_docs.write().await.remove(&job_id);
        self.cancelled.write().await.remove(&job_id);
        self.retry_counts.write().await.remove(&job_id);
        let _ = self.segment_store.delete_all_for(&job_id.to_string()).await;
    }
}

impl Outcome {
    fn classify(err: UccError) -> Self {
        match err.class() {
            ErrorClass::Transient => Outcome::Retry(err),
            ErrorClass::Cancelled => Outcome::Cancelled,
            ErrorClass::Fatal => Outcome::Fatal(err),
        }
    }
}

fn json<T: serde::Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ucc_core::types::MatchStatus;
    use ucc_embed::LocalEmbedder;
    use ucc_store::InMemoryStore;

    fn build_orchestrator() -> Orchestrator {
        let store = Arc::new(InMemoryStore::new());
        let job_store: Arc<dyn JobStore> = store.clone();
        let segment_store: Arc<dyn SegmentStore> = store;
        let embedder: Arc<dyn Embedder> = Arc::new(LocalEmbedder::new());
        Orchestrator::new(
            job_store,
            segment_store,
            embedder,
            Arc::new(ProgressBus::new()),
            UccConfig::default(),
        )
    }

    #[tokio::test]
    async fn identical_documents_yield_only_unchanged_matches() {
        let orch = build_orchestrator();
        let text = b"Coverage: We will pay for theft of insured property.".to_vec();
        let result = orch
            .submit_and_run("a.pdf".into(), text.clone(), "b.pdf".into(), text)
            .await
            .unwrap();
        assert!(!result.matches.is_empty());
        assert!(result.matches.iter().all(|m| m.status == MatchStatus::Unchanged));
        assert_eq!(result.summary.counts.modified, 0);
        assert_eq!(result.summary.counts.added, 0);
        assert_eq!(result.summary.counts.removed, 0);
    }

    #[tokio::test]
    async fn pure_addition_produces_one_added_match() {
        let orch = build_orchestrator();
        let a = b"Coverage: We will pay for theft of insured property.".to_vec();
        let b = b"Coverage: We will pay for theft of insured property.\x0cCoverage: We will pay for flood damage.".to_vec();
        let result = orch
            .submit_and_run("a.pdf".into(), a, "b.pdf".into(), b)
            .await
            .unwrap();
        assert_eq!(result.summary.counts.added, 1);
        assert_eq!(result.summary.counts.unchanged, 1);
    }

    #[tokio::test]
    async fn cancellation_before_claim_marks_job_cancelled() {
        let orch = build_orchestrator();
        let job_id = orch
            .submit(
                "a.pdf".into(),
                b"Coverage: theft.".to_vec(),
                "b.pdf".into(),
                b"Coverage: fire.".to_vec(),
            )
            .await
            .unwrap();
        orch.request_cancel(job_id).await.unwrap();
        let job = orch.job_store.claim_next_queued().await.unwrap().unwrap();
        orch.drive(job).await.unwrap();

        let job = orch.job_store.get(job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
    }

    #[tokio::test]
    async fn request_cancel_on_unknown_job_errors() {
        let orch = build_orchestrator();
        let err = orch.request_cancel(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, UccError::NotFound(_)));
    }

    #[tokio::test]
    async fn empty_document_warns_without_failing() {
        let orch = build_orchestrator();
        let result = orch
            .submit_and_run("empty.pdf".into(), Vec::new(), "b.pdf".into(), b"Coverage: theft.".to_vec())
            .await
            .unwrap();
        assert!(result.warnings.iter().any(|w| w == "empty document"));
    }
}
