//! `DefinitionResolver` (`spec.md` §4.2): builds a term -> expansion map and
//! expands defined terms in downstream text for alignment.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use ucc_core::types::{Block, Definition};

fn definition_section_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)definition").unwrap())
}

fn inline_definition_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // "<Term>" means <expansion>.   OR   Term means <expansion>.
    RE.get_or_init(|| {
        Regex::new(r#"(?i)"([^"]+)"\s+means\s+(.+?)\.|^([A-Z][A-Za-z0-9 /'-]{1,60})\s+means\s+(.+?)\.$"#)
            .unwrap()
    })
}

fn normalize_term(term: &str) -> String {
    term.chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct DefinitionResolver;

impl DefinitionResolver {
    /// Scan non-admin blocks for a "Definitions"-headed section or inline
    /// `"Term" means expansion.` sentences.
    pub fn resolve(&self, blocks: &[Block]) -> Vec<Definition> {
        let mut out = Vec::new();
        for block in blocks {
            let in_definitions_section = block
                .section_path
                .last()
                .map(|h| definition_section_re().is_match(h))
                .unwrap_or(false);

            if in_definitions_section {
                for sentence in split_sentences(&block.text) {
                    if let Some((term, expansion)) = parse_inline_definition(&sentence) {
                        out.push(Definition {
                            term_normalized: normalize_term(&term),
                            expansion,
                            source_block_id: block.block_id.clone(),
                        });
                    }
                }
                continue;
            }

            for sentence in split_sentences(&block.text) {
                if let Some((term, expansion)) = parse_inline_definition(&sentence) {
                    out.push(Definition {
                        term_normalized: normalize_term(&term),
                        expansion,
                        source_block_id: block.block_id.clone(),
                    });
                }
            }
        }
        out
    }

    /// Build a lookup map keyed by normalized term.
    pub fn to_map(defs: &[Definition]) -> BTreeMap<String, String> {
        defs.iter()
            .map(|d| (d.term_normalized.clone(), d.expansion.clone()))
            .collect()
    }

    /// Expand every whole-word occurrence of a defined term in `text` with
    /// `<term> (= <expansion>)`. Each term is expanded once only — if an
    /// expansion itself contains another defined term, that nested term is
    /// NOT recursively expanded (`spec.md` §4.2 edge case).
    ///
    /// All term matches are located against a single frozen copy of `text`
    /// before any output is built, so an expansion inserted for one term can
    /// never be re-scanned and matched against another term.
    pub fn expand(text: &str, defs: &BTreeMap<String, String>) -> String {
        if defs.is_empty() {
            return text.to_string();
        }

        let mut matches: Vec<(usize, usize, &str)> = Vec::new();
        for (term, expansion) in defs {
            if term.is_empty() {
                continue;
            }
            let pattern = format!(r"(?i)\b{}\b", regex::escape(term));
            if let Ok(re) = Regex::new(&pattern) {
                for m in re.find_iter(text) {
                    matches.push((m.start(), m.end(), expansion.as_str()));
                }
            }
        }
        if matches.is_empty() {
            return text.to_string();
        }

        // Longer matches first so that on an overlap (e.g. "loss" inside
        // "total loss") the more specific term wins; ties break by start.
        matches.sort_by(|a, b| {
            a.0.cmp(&b.0).then_with(|| (b.1 - b.0).cmp(&(a.1 - a.0)))
        });

        let mut out = String::new();
        let mut cursor = 0;
        for (start, end, expansion) in matches {
            if start < cursor {
                continue;
            }
            out.push_str(&text[cursor..end]);
            out.push_str(&format!(" (= {expansion})"));
            cursor = end;
        }
        out.push_str(&text[cursor..]);
        out
    }
}

fn split_sentences(text: &str) -> Vec<String> {
    text.split('.')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| format!("{s}."))
        .collect()
}

fn parse_inline_definition(sentence: &str) -> Option<(String, String)> {
    let caps = inline_definition_re().captures(sentence)?;
    if let (Some(term), Some(expansion)) = (caps.get(1), caps.get(2)) {
        return Some((term.as_str().to_string(), expansion.as_str().trim().to_string()));
    }
    if let (Some(term), Some(expansion)) = (caps.get(3), caps.get(4)) {
        return Some((term.as_str().to_string(), expansion.as_str().trim().to_string()));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(text: &str, section: &str) -> Block {
        Block::new("doc1", 0, text, 1, 1, vec![section.to_string()])
    }

    #[test]
    fn parses_quoted_term_definition() {
        let resolver = DefinitionResolver;
        let blocks = vec![block(
            r#""Insured" means the person named in the schedule."#,
            "1. Definitions",
        )];
        let defs = resolver.resolve(&blocks);
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].term_normalized, "insured");
        assert_eq!(defs[0].expansion, "the person named in the schedule");
    }

    #[test]
    fn expand_annotates_whole_word_occurrences_once() {
        let mut defs = BTreeMap::new();
        defs.insert("insured".to_string(), "the named person".to_string());
        let expanded = DefinitionResolver::expand("The Insured must notify us.", &defs);
        assert!(expanded.contains("Insured (= the named person)"));
    }

    #[test]
    fn expand_does_not_recurse_into_nested_definitions() {
        let mut defs = BTreeMap::new();
        defs.insert("event".to_string(), "an insured occurrence".to_string());
        defs.insert("insured".to_string(), "the named person".to_string());
        let expanded = DefinitionResolver::expand("The Event triggers cover.", &defs);
        // "insured" appears inside the expansion text but must not itself be expanded.
        assert_eq!(
            expanded,
            "The Event (= an insured occurrence) triggers cover."
        );
    }
}
