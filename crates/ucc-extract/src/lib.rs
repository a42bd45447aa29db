//! LayoutExtractor, DefinitionResolver, ClauseClassifier and DNAExtractor —
//! the four per-document analysis stages (`spec.md` §4.1–§4.4).

pub mod classify;
pub mod definitions;
pub mod dna;
pub mod layout;

pub use classify::ClauseClassifier;
pub use definitions::DefinitionResolver;
pub use dna::DnaExtractor;
pub use layout::{LayoutExtractor, PageTextSource, PlainTextPageSource, TextPage};

use ucc_core::types::{Block, Clause};

/// Runs classification + DNA extraction over a document's blocks, producing
/// `Clause`s. Admin blocks get `ClauseType::Admin` and a default (neutral) DNA
/// without running the cue scanners — `spec.md` §4.3/§4.4 both scope
/// themselves to "non-admin Block"s.
pub fn build_clauses(blocks: Vec<Block>) -> Vec<Clause> {
    let classifier = ClauseClassifier;
    let dna_extractor = DnaExtractor;
    blocks
        .into_iter()
        .map(|block| {
            if block.is_admin {
                Clause {
                    block,
                    clause_type: ucc_core::types::ClauseType::Admin,
                    dna: Default::default(),
                }
            } else {
                let clause_type = classifier.classify(&block);
                let mut block = block;
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
            }
        })
        .collect()
}
