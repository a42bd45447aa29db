//! `POST /ucc/preprocess` — parse a single PDF and return a `Document` with
//! its `Block`s and classifier/DNA metadata (`spec.md` §6). Exercises the
//! per-document half of the pipeline (segments 1-4) without an orchestrator,
//! since there is no pairing or job to track yet.

use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;

use ucc_core::error::UccError;
use ucc_core::types::{doc_id_of, Clause};
use ucc_extract::{build_clauses, DefinitionResolver, LayoutExtractor};

use crate::error::AppError;
use crate::multipart::collect_single;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct PreprocessSummary {
    pub block_count: usize,
    pub admin_block_count: usize,
    pub definition_count: usize,
}

#[derive(Debug, Serialize)]
pub struct PreprocessResponse {
    pub doc_id: String,
    pub file_name: String,
    pub blocks: Vec<Clause>,
    pub summary: PreprocessSummary,
    pub warnings: Vec<String>,
}

pub async fn preprocess(
    State(_state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<PreprocessResponse>, AppError> {
    let upload = collect_single(multipart).await?;
    // options is accepted on this endpoint per the wire contract's shared
    // multipart shape, but preprocessing has nothing in it to apply yet.
    let _ = upload.options_raw.as_deref();

    let doc_id = doc_id_of(&upload.bytes);
    let mut warnings = Vec::new();

    let extractor = LayoutExtractor::default();
    let blocks = match extractor.extract(&upload.bytes, &doc_id) {
        Ok(blocks) => blocks,
        Err(UccError::Parse(msg)) => {
            warnings.push(format!("parse error: {msg}"));
            Vec::new()
        }
        Err(e) => return Err(e.into()),
    };

    let definitions = DefinitionResolver.resolve(&blocks);
    let admin_count = blocks.iter().filter(|b| b.is_admin).count();
    let clauses = build_clauses(blocks);

    Ok(Json(PreprocessResponse {
        doc_id,
        file_name: upload.file_name,
        summary: PreprocessSummary {
            block_count: clauses.len(),
            admin_block_count: admin_count,
            definition_count: definitions.len(),
        },
        blocks: clauses,
        warnings,
    }))
}
