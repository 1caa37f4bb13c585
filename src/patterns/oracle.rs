use crate::extraction::parse::{ParseError, extract_json_object};
use crate::llm::{CompletionBackend, CompletionSettings, LlmError};
use crate::patterns::{PatternError, PatternSet};
use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

static SOLVE_OUTPUT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)print\(solve\(\)\)\s*#\s*Output:\s*(\{.*\})").unwrap());

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("backend failure: {0}")]
    Backend(#[from] LlmError),

    #[error("no pattern object in response: {0}")]
    Unparseable(#[from] ParseError),

    #[error("invalid patterns: {0}")]
    Invalid(#[from] PatternError),
}

/// Source of the classification patterns for a base URL.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PatternOracle: Send + Sync {
    async fn generate(&self, base_url: &Url) -> Result<PatternSet, OracleError>;
}

/// Ask the oracle, validate its answer, and fall back to the built-in
/// reference set on any failure.
pub async fn resolve_patterns(oracle: &dyn PatternOracle, base_url: &Url) -> PatternSet {
    let result = match oracle.generate(base_url).await {
        Ok(set) => set.validate().map(|_| set).map_err(OracleError::from),
        Err(e) => Err(e),
    };

    match result {
        Ok(set) if !set.is_empty() => {
            info!(base_url = %base_url, "using oracle patterns");
            set
        }
        Ok(_) => {
            warn!(base_url = %base_url, "oracle returned no patterns, using defaults");
            PatternSet::reference_defaults()
        }
        Err(e) => {
            warn!(base_url = %base_url, error = %e, "pattern oracle failed, using defaults");
            PatternSet::reference_defaults()
        }
    }
}

/// Hands out a fixed set, e.g. one supplied through configuration.
#[derive(Debug, Clone)]
pub struct StaticPatternOracle {
    patterns: PatternSet,
}

impl StaticPatternOracle {
    pub fn new(patterns: PatternSet) -> Self {
        Self { patterns }
    }
}

#[async_trait]
impl PatternOracle for StaticPatternOracle {
    async fn generate(&self, _base_url: &Url) -> Result<PatternSet, OracleError> {
        Ok(self.patterns.clone())
    }
}

/// Asks a completion backend to write the four patterns for a site.
pub struct LlmPatternOracle {
    backend: Arc<dyn CompletionBackend>,
    settings: CompletionSettings,
}

impl LlmPatternOracle {
    pub fn new(backend: Arc<dyn CompletionBackend>, settings: CompletionSettings) -> Self {
        Self { backend, settings }
    }

    fn prompt(base_url: &Url) -> String {
        format!(
            r#"The listing site at {base_url} links to two kinds of pages: articles and job postings.
Write four regular expressions for URLs on this site:
1) "article_pattern" matches any article URL
2) "job_pattern" matches any job posting URL
3) "article_id_capture" has one capturing group holding the article id
4) "job_id_capture" has one capturing group holding the job id

Answer with Python code whose last line is:
print(solve())  # Output: {{"article_pattern": "...", "job_pattern": "...", "article_id_capture": "...", "job_id_capture": "..."}}
The object after "Output:" must be valid JSON."#
        )
    }
}

/// Pull the pattern object out of a free-form answer. The `# Output:` marker
/// is preferred; otherwise the first `{` to the last `}` is tried.
pub fn parse_oracle_response(raw: &str) -> Result<PatternSet, OracleError> {
    let object = match SOLVE_OUTPUT_REGEX.captures(raw).and_then(|c| c.get(1)) {
        Some(m) => extract_json_object(m.as_str())?,
        None => extract_json_object(raw)?,
    };
    let set: PatternSet = serde_json::from_value(serde_json::Value::Object(object))
        .map_err(PatternError::from)?;
    set.validate()?;
    Ok(set)
}

#[async_trait]
impl PatternOracle for LlmPatternOracle {
    async fn generate(&self, base_url: &Url) -> Result<PatternSet, OracleError> {
        info!(base_url = %base_url, "requesting classification patterns");
        let request = self.settings.request(Self::prompt(base_url));
        let raw = self.backend.complete(&request).await?;
        debug!(response = %raw, "pattern oracle response");
        parse_oracle_response(&raw)
    }
}
