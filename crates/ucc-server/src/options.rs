//! The `options` JSON object accepted by the pair endpoints (`spec.md` §6).
//! Parsed and range-validated at the wire boundary; `ucc-core::types` never
//! (de)serializes anything but the `ComparisonResult.matches[].numeric_delta`
//! mapping form, so there is no ambiguity to reject here beyond range checks.

use serde::Deserialize;

use ucc_core::config::{EmbedderKind, UccConfig};
use ucc_core::error::{Result, UccError};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedderOption {
    Auto,
    Local,
    Remote,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompareOptions {
    pub embedder: Option<EmbedderOption>,
    pub similarity_threshold: Option<f64>,
    pub return_token_diffs: Option<bool>,
    pub max_candidates_per_clause: Option<usize>,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            embedder: None,
            similarity_threshold: None,
            return_token_diffs: None,
            max_candidates_per_clause: None,
        }
    }
}

impl CompareOptions {
    pub fn validate(&self) -> Result<()> {
        if let Some(t) = self.similarity_threshold {
            if !(0.0..=1.0).contains(&t) {
                return Err(UccError::InvalidInput(
                    "options.similarity_threshold must be in [0,1]".into(),
                ));
            }
        }
        if let Some(k) = self.max_candidates_per_clause {
            if !(1..=10).contains(&k) {
                return Err(UccError::InvalidInput(
                    "options.max_candidates_per_clause must be in [1,10]".into(),
                ));
            }
        }
        Ok(())
    }

    pub fn return_token_diffs(&self) -> bool {
        self.return_token_diffs.unwrap_or(true)
    }

    /// Applies this request's overrides onto a base config, for the
    /// synchronous `/ucc/compare` path, which builds one ephemeral
    /// orchestration per call and can honor per-request overrides without
    /// disturbing the shared async worker pool's config (selected once at
    /// server start, per `spec.md` §9).
    pub fn apply(&self, base: &UccConfig) -> UccConfig {
        let mut cfg = base.clone();
        if let Some(t) = self.similarity_threshold {
            cfg.similarity_threshold = t;
        }
        if let Some(k) = self.max_candidates_per_clause {
            cfg.max_candidates_per_clause = k;
        }
        if let Some(e) = &self.embedder {
            cfg.embedder = match e {
                EmbedderOption::Auto => EmbedderKind::Auto,
                EmbedderOption::Local => EmbedderKind::Local,
                EmbedderOption::Remote => EmbedderKind::Remote,
            };
        }
        cfg
    }

    /// Parses the multipart `options` field, if present. Empty/absent input
    /// yields all-default options, never an error.
    pub fn parse(raw: Option<&str>) -> Result<Self> {
        let opts: Self = match raw {
            Some(s) if !s.trim().is_empty() => serde_json::from_str(s)
                .map_err(|e| UccError::InvalidInput(format!("invalid options JSON: {e}")))?,
            _ => Self::default(),
        };
        opts.validate()?;
        Ok(opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_options_default_to_spec_defaults() {
        let opts = CompareOptions::parse(None).unwrap();
        assert!(opts.return_token_diffs());
        assert!(opts.similarity_threshold.is_none());
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let err = CompareOptions::parse(Some(r#"{"similarity_threshold": 1.5}"#)).unwrap_err();
        assert!(matches!(err, UccError::InvalidInput(_)));
    }

    #[test]
    fn out_of_range_max_candidates_is_rejected() {
        let err = CompareOptions::parse(Some(r#"{"max_candidates_per_clause": 11}"#)).unwrap_err();
        assert!(matches!(err, UccError::InvalidInput(_)));
    }

    #[test]
    fn apply_overrides_only_set_fields() {
        let base = UccConfig::default();
        let opts = CompareOptions::parse(Some(r#"{"similarity_threshold": 0.8}"#)).unwrap();
        let merged = opts.apply(&base);
        assert_eq!(merged.similarity_threshold, 0.8);
        assert_eq!(merged.max_candidates_per_clause, base.max_candidates_per_clause);
    }
}
