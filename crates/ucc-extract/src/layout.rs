//! `LayoutExtractor` (`spec.md` §4.1): PDF bytes -> ordered Blocks.
//!
//! True PDF rendering/raw-text extraction is an external, pluggable
//! collaborator (`spec.md` §1's "out of scope" list names it explicitly).
//! `PageTextSource` is that plug point; `PlainTextPageSource` is a
//! best-effort default good enough for already-extracted text (e.g. a
//! upstream renderer has produced per-page text, form-feed separated) and
//! for tests. The section-path/is_admin policy below — this crate's actual
//! responsibility — is implemented in full regardless of which source feeds it.

use regex::Regex;
use std::sync::OnceLock;

use ucc_core::error::{ExtractError, Result};
use ucc_core::lexicon::ADMIN_SECTION_MARKERS;
use ucc_core::types::Block;

/// One page's worth of already-extracted text lines.
#[derive(Debug, Clone)]
pub struct TextPage {
    pub page_number: u32,
    pub lines: Vec<String>,
}

/// Pluggable raw-extraction boundary. Implementations turn PDF bytes into
/// per-page text; the real renderer lives outside this crate's scope.
pub trait PageTextSource: Send + Sync {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<TextPage>>;
}

/// Treats `bytes` as UTF-8 (lossy), splitting into pages on form-feed
/// (`\x0c`) and lines on `\n`. Pages/lines are trimmed; fully blank input
/// (no non-whitespace bytes at all) is treated as "no extractable text
/// layer".
pub struct PlainTextPageSource;

impl PageTextSource for PlainTextPageSource {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<TextPage>> {
        let text = String::from_utf8_lossy(bytes);
        if text.trim().is_empty() {
            return Err(ExtractError::NoExtractableText.into());
        }
        let pages = text
            .split('\x0c')
            .enumerate()
            .map(|(i, page)| TextPage {
                page_number: (i + 1) as u32,
                lines: page.lines().map(|l| l.to_string()).collect(),
            })
            .collect();
        Ok(pages)
    }
}

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:(?P<num>\d+(?:\.\d+)*)\.?|(?P<alpha>[A-Z])\))\s+\S").unwrap()
    })
}

fn title_case_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // SHORT, TITLE-CASE line with no terminal punctuation: a plausible heading.
    RE.get_or_init(|| Regex::new(r"^(?:[A-Z][A-Za-z0-9/&'-]*)(?: [A-Z][A-Za-z0-9/&'-]*){0,6}$").unwrap())
}

struct Heading {
    depth: usize,
    text: String,
}

fn classify_heading(line: &str) -> Option<Heading> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.len() > 80 {
        return None;
    }
    if let Some(caps) = heading_re().captures(trimmed) {
        if let Some(num) = caps.name("num") {
            let depth = num.as_str().split('.').count();
            return Some(Heading {
                depth,
                text: trimmed.to_string(),
            });
        }
        if caps.name("alpha").is_some() {
            return Some(Heading {
                depth: 1,
                text: trimmed.to_string(),
            });
        }
    }
    if !trimmed.ends_with('.') && !trimmed.ends_with(',') && title_case_re().is_match(trimmed) {
        return Some(Heading {
            depth: 1,
            text: trimmed.to_string(),
        });
    }
    None
}

fn is_admin_path(section_path: &[String]) -> bool {
    section_path.iter().any(|segment| {
        let lower = segment.to_ascii_lowercase();
        ADMIN_SECTION_MARKERS
            .iter()
            .any(|marker| lower.starts_with(marker))
    })
}

pub struct LayoutExtractor {
    source: Box<dyn PageTextSource>,
}

impl Default for LayoutExtractor {
    fn default() -> Self {
        Self {
            source: Box::new(PlainTextPageSource),
        }
    }
}

impl LayoutExtractor {
    pub fn new(source: Box<dyn PageTextSource>) -> Self {
        Self { source }
    }

    /// `spec.md` §4.1: raw bytes + `doc_id` -> ordered Blocks.
    pub fn extract(&self, bytes: &[u8], doc_id: &str) -> Result<Vec<Block>> {
        let pages = self.source.extract_pages(bytes)?;

        let mut blocks = Vec::new();
        let mut section_stack: Vec<(usize, String)> = Vec::new();
        let mut sequence_number = 0usize;

        let mut current_lines: Vec<String> = Vec::new();
        let mut current_page_start: Option<u32> = None;
        let mut current_page_end: u32 = 0;

        let flush = |blocks: &mut Vec<Block>,
                     seq: &mut usize,
                     lines: &mut Vec<String>,
                     page_start: &mut Option<u32>,
                     page_end: u32,
                     section_path: &[String]| {
            if lines.is_empty() {
                return;
            }
            let text = lines.join(" ").trim().to_string();
            if !text.is_empty() {
                let ps = page_start.unwrap_or(page_end);
                let mut block = Block::new(doc_id, *seq, text, ps, page_end, section_path.to_vec());
                block.is_admin = is_admin_path(&block.section_path);
                blocks.push(block);
                *seq += 1;
            }
            lines.clear();
            *page_start = None;
        };

        for page in &pages {
            for line in &page.lines {
                if line.trim().is_empty() {
                    let path: Vec<String> = if section_stack.is_empty() {
                        vec!["(root)".to_string()]
                    } else {
                        section_stack.iter().map(|(_, t)| t.clone()).collect()
                    };
                    flush(
                        &mut blocks,
                        &mut sequence_number,
                        &mut current_lines,
                        &mut current_page_start,
                        current_page_end.max(page.page_number),
                        &path,
                    );
                    continue;
                }

                if let Some(heading) = classify_heading(line) {
                    let path: Vec<String> = if section_stack.is_empty() {
                        vec!["(root)".to_string()]
                    } else {
                        section_stack.iter().map(|(_, t)| t.clone()).collect()
                    };
                    flush(
                        &mut blocks,
                        &mut sequence_number,
                        &mut current_lines,
                        &mut current_page_start,
                        current_page_end.max(page.page_number),
                        &path,
                    );
                    while section_stack
                        .last()
                        .map(|(d, _)| *d >= heading.depth)
                        .unwrap_or(false)
                    {
                        section_stack.pop();
                    }
                    section_stack.push((heading.depth, heading.text));
                    continue;
                }

                current_page_start.get_or_insert(page.page_number);
                current_page_end = page.page_number;
                current_lines.push(line.trim().to_string());
            }
        }

        let path: Vec<String> = if section_stack.is_empty() {
            vec!["(root)".to_string()]
        } else {
            section_stack.iter().map(|(_, t)| t.clone()).collect()
        };
        flush(
            &mut blocks,
            &mut sequence_number,
            &mut current_lines,
            &mut current_page_start,
            current_page_end,
            &path,
        );

        Ok(blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_bytes_is_parse_error() {
        let extractor = LayoutExtractor::default();
        let err = extractor.extract(b"   \n\n  ", "doc1").unwrap_err();
        assert!(matches!(
            err,
            ucc_core::error::UccError::Extract(ExtractError::NoExtractableText)
        ));
    }

    #[test]
    fn root_section_when_no_headings() {
        let extractor = LayoutExtractor::default();
        let blocks = extractor
            .extract(b"We will pay for theft.", "doc1")
            .unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].section_path, vec!["(root)".to_string()]);
        assert!(!blocks[0].is_admin);
    }

    #[test]
    fn numbered_headings_build_nested_section_path() {
        let extractor = LayoutExtractor::default();
        let doc = "1. Coverage\n\nWe will pay for theft.\n\n1.1 Exclusions\n\nWe will not pay for war.";
        let blocks = extractor.extract(doc.as_bytes(), "doc1").unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].section_path, vec!["1. Coverage".to_string()]);
        assert_eq!(
            blocks[1].section_path,
            vec!["1. Coverage".to_string(), "1.1 Exclusions".to_string()]
        );
    }

    #[test]
    fn schedule_section_marks_blocks_admin() {
        let extractor = LayoutExtractor::default();
        let doc = "Policy Schedule\n\nInsured: Acme Pty Ltd.";
        let blocks = extractor.extract(doc.as_bytes(), "doc1").unwrap();
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].is_admin);
    }

    #[test]
    fn blocks_are_sequentially_ordered() {
        let extractor = LayoutExtractor::default();
        let doc = "First clause here.\n\nSecond clause here.\n\nThird clause here.";
        let blocks = extractor.extract(doc.as_bytes(), "doc1").unwrap();
        let seqs: Vec<usize> = blocks.iter().map(|b| b.sequence_number).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
    }
}
