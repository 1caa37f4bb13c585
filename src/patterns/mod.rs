//! Classification patterns for a crawl session.
//!
//! A [`PatternSet`] is produced once per crawl, usually by a
//! [`PatternOracle`](oracle::PatternOracle), and is read-only afterwards.
//! Every field is either empty (rule disabled) or a regular expression.

pub mod oracle;

pub use oracle::{LlmPatternOracle, OracleError, PatternOracle, StaticPatternOracle, resolve_patterns};

use regex::Regex;
use serde::Deserialize;
use std::fmt::{Display, Formatter};
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PatternSet {
    #[serde(default)]
    pub article_pattern: String,
    #[serde(default)]
    pub job_pattern: String,
    /// Must contain one capture group holding the article id.
    #[serde(default)]
    pub article_id_capture: String,
    /// Must contain one capture group holding the job id.
    #[serde(default)]
    pub job_id_capture: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternField {
    ArticlePattern,
    JobPattern,
    ArticleIdCapture,
    JobIdCapture,
}

impl PatternField {
    pub fn key(&self) -> &'static str {
        match self {
            Self::ArticlePattern => "article_pattern",
            Self::JobPattern => "job_pattern",
            Self::ArticleIdCapture => "article_id_capture",
            Self::JobIdCapture => "job_id_capture",
        }
    }
}

impl Display for PatternField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Error, Debug)]
pub enum PatternError {
    #[error("invalid pattern json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid regex for {field}: {source}")]
    Regex {
        field: PatternField,
        #[source]
        source: regex::Error,
    },
}

impl PatternSet {
    pub fn new(
        article_pattern: impl Into<String>,
        job_pattern: impl Into<String>,
        article_id_capture: impl Into<String>,
        job_id_capture: impl Into<String>,
    ) -> Self {
        Self {
            article_pattern: article_pattern.into(),
            job_pattern: job_pattern.into(),
            article_id_capture: article_id_capture.into(),
            job_id_capture: job_id_capture.into(),
        }
    }

    /// Built-in rules for the reference listing site, used whenever the
    /// oracle fails or hands back something unusable.
    pub fn reference_defaults() -> Self {
        Self::new(
            r"https://www\.azubiyo\.de/article/(\w+)",
            r"https://www\.azubiyo\.de/stellenanzeigen/.*",
            r"/article/(\w+)",
            r"/stellenanzeigen/([^/]+)/?",
        )
    }

    /// Parse a JSON object using the oracle's key names. Missing keys are
    /// treated as disabled rules.
    pub fn from_json(raw: &str) -> Result<Self, PatternError> {
        let set: Self = serde_json::from_str(raw)?;
        set.validate()?;
        Ok(set)
    }

    pub fn fields(&self) -> [(PatternField, &str); 4] {
        [
            (PatternField::ArticlePattern, self.article_pattern.as_str()),
            (PatternField::JobPattern, self.job_pattern.as_str()),
            (PatternField::ArticleIdCapture, self.article_id_capture.as_str()),
            (PatternField::JobIdCapture, self.job_id_capture.as_str()),
        ]
    }

    /// Reports the first field that is non-empty and fails to compile.
    pub fn validate(&self) -> Result<(), PatternError> {
        for (field, pattern) in self.fields() {
            if pattern.is_empty() {
                continue;
            }
            Regex::new(pattern).map_err(|source| PatternError::Regex { field, source })?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|(_, pattern)| pattern.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_defaults_are_valid() {
        let set = PatternSet::reference_defaults();
        assert!(set.validate().is_ok());
        assert!(!set.is_empty());
    }

    #[test]
    fn from_json_fills_missing_keys_with_empty() {
        let set = PatternSet::from_json(r#"{"job_pattern": "/jobs/\\d+"}"#).unwrap();
        assert_eq!(set.job_pattern, r"/jobs/\d+");
        assert!(set.article_pattern.is_empty());
        assert!(set.job_id_capture.is_empty());
    }

    #[test]
    fn validate_names_the_broken_field() {
        let set = PatternSet::new("", "", "/article/(\\w+", "");
        match set.validate() {
            Err(PatternError::Regex { field, .. }) => {
                assert_eq!(field, PatternField::ArticleIdCapture)
            }
            other => panic!("expected regex error, got {:?}", other),
        }
    }

    #[test]
    fn from_json_rejects_non_object() {
        assert!(matches!(
            PatternSet::from_json("[1, 2]"),
            Err(PatternError::Json(_))
        ));
    }

    #[test]
    fn empty_set_is_valid() {
        let set = PatternSet::default();
        assert!(set.is_empty());
        assert!(set.validate().is_ok());
    }
}
