//! URL classification into content categories.

use crate::patterns::{PatternField, PatternSet};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::{Display, Formatter};
use tracing::warn;
use url::Url;

/// Path segment of the reference site's job listings. Matched as a plain
/// substring when no configured rule applies.
pub const FALLBACK_JOB_SEGMENT: &str = "azubiyo.de/stellenanzeigen/";

static FALLBACK_JOB_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://www\.azubiyo\.de/stellenanzeigen/([^/]+)/?").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Article,
    Job,
    Unclassified,
}

/// The categories a kept link can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Article,
    Job,
}

impl Category {
    pub fn kind(self) -> Option<ContentKind> {
        match self {
            Self::Article => Some(ContentKind::Article),
            Self::Job => Some(ContentKind::Job),
            Self::Unclassified => None,
        }
    }
}

impl Display for ContentKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Article => f.write_str("article"),
            Self::Job => f.write_str("job"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: Category,
    /// First capture of the matching id rule, or empty.
    pub id: String,
}

impl Classification {
    fn new(category: Category, id: impl Into<String>) -> Self {
        Self {
            category,
            id: id.into(),
        }
    }

    pub fn unclassified() -> Self {
        Self::new(Category::Unclassified, "")
    }
}

/// A classified link found during the crawl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRecord {
    text: String,
    url: Url,
    kind: ContentKind,
    id: String,
}

impl LinkRecord {
    /// Returns `None` for unclassified links, which are never kept.
    pub fn from_classification(
        text: impl Into<String>,
        url: Url,
        classification: Classification,
    ) -> Option<Self> {
        let kind = classification.category.kind()?;
        Some(Self {
            text: text.into(),
            url,
            kind,
            id: classification.id,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    pub fn category(&self) -> Category {
        match self.kind {
            ContentKind::Article => Category::Article,
            ContentKind::Job => Category::Job,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// A [`PatternSet`] compiled once per crawl. Rules that are empty or fail to
/// compile are stored as `None` and never match.
#[derive(Debug, Clone)]
pub struct CompiledPatterns {
    article: Option<Regex>,
    job: Option<Regex>,
    article_id: Option<Regex>,
    job_id: Option<Regex>,
}

fn compile(field: PatternField, pattern: &str) -> Option<Regex> {
    if pattern.is_empty() {
        return None;
    }
    match Regex::new(pattern) {
        Ok(regex) => Some(regex),
        Err(e) => {
            warn!(field = %field, pattern, error = %e, "pattern does not compile, rule disabled");
            None
        }
    }
}

fn first_capture(regex: Option<&Regex>, url: &str) -> String {
    regex
        .and_then(|r| r.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

impl CompiledPatterns {
    pub fn compile(patterns: &PatternSet) -> Self {
        Self {
            article: compile(PatternField::ArticlePattern, &patterns.article_pattern),
            job: compile(PatternField::JobPattern, &patterns.job_pattern),
            article_id: compile(PatternField::ArticleIdCapture, &patterns.article_id_capture),
            job_id: compile(PatternField::JobIdCapture, &patterns.job_id_capture),
        }
    }

    pub fn classify(&self, url: &str) -> Classification {
        if self.article.as_ref().is_some_and(|r| r.is_match(url)) {
            return Classification::new(
                Category::Article,
                first_capture(self.article_id.as_ref(), url),
            );
        }

        if self.job.as_ref().is_some_and(|r| r.is_match(url)) {
            return Classification::new(Category::Job, first_capture(self.job_id.as_ref(), url));
        }

        if url.contains(FALLBACK_JOB_SEGMENT) {
            return Classification::new(Category::Job, first_capture(Some(&*FALLBACK_JOB_ID), url));
        }

        Classification::unclassified()
    }
}

/// Classify a single URL. Prefer [`CompiledPatterns`] when classifying many.
pub fn classify(url: &str, patterns: &PatternSet) -> Classification {
    CompiledPatterns::compile(patterns).classify(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> PatternSet {
        PatternSet::reference_defaults()
    }

    #[test]
    fn article_rule_extracts_id() {
        let c = classify("https://www.azubiyo.de/article/bewerbung123", &defaults());
        assert_eq!(c.category, Category::Article);
        assert_eq!(c.id, "bewerbung123");
    }

    #[test]
    fn job_rule_extracts_id() {
        let c = classify(
            "https://www.azubiyo.de/stellenanzeigen/kaufmann-im-einzelhandel_aldi/",
            &defaults(),
        );
        assert_eq!(c.category, Category::Job);
        assert_eq!(c.id, "kaufmann-im-einzelhandel_aldi");
    }

    #[test]
    fn article_rule_wins_over_job_rule() {
        let set = PatternSet::new(r"example\.com/", r"example\.com/", "", "");
        let c = classify("https://example.com/anything", &set);
        assert_eq!(c.category, Category::Article);
        assert_eq!(c.id, "");
    }

    #[test]
    fn matching_rule_without_id_capture_yields_empty_id() {
        let set = PatternSet::new("", r"/jobs/", "", "");
        let c = classify("https://example.com/jobs/42", &set);
        assert_eq!(c, Classification::new(Category::Job, ""));
    }

    #[test]
    fn id_capture_that_misses_yields_empty_id() {
        let set = PatternSet::new(r"/news/", "", r"/story/(\d+)", "");
        let c = classify("https://example.com/news/today", &set);
        assert_eq!(c.category, Category::Article);
        assert_eq!(c.id, "");
    }

    #[test]
    fn empty_patterns_are_unclassified() {
        let c = classify("https://example.com/jobs/42", &PatternSet::default());
        assert_eq!(c, Classification::unclassified());
    }

    #[test]
    fn fallback_segment_classifies_job() {
        let c = classify(
            "https://www.azubiyo.de/stellenanzeigen/mechatroniker_bosch",
            &PatternSet::default(),
        );
        assert_eq!(c.category, Category::Job);
        assert_eq!(c.id, "mechatroniker_bosch");
    }

    #[test]
    fn fallback_segment_without_id_match() {
        // Substring present, but not in the shape of the fallback id regex.
        let c = classify(
            "http://m.azubiyo.de/stellenanzeigen/",
            &PatternSet::default(),
        );
        assert_eq!(c, Classification::new(Category::Job, ""));
    }

    #[test]
    fn broken_article_pattern_falls_through_to_job_rule() {
        let set = PatternSet::new("(unclosed", r"/jobs/(\d+)", "", r"/jobs/(\d+)");
        let c = classify("https://example.com/jobs/77", &set);
        assert_eq!(c.category, Category::Job);
        assert_eq!(c.id, "77");
    }

    #[test]
    fn capture_without_group_yields_empty_id() {
        let set = PatternSet::new(r"/a/", "", r"/a/\d+", "");
        let c = classify("https://example.com/a/12", &set);
        assert_eq!(c.category, Category::Article);
        assert_eq!(c.id, "");
    }

    #[test]
    fn link_record_drops_unclassified() {
        let url = Url::parse("https://example.com/about").unwrap();
        assert!(
            LinkRecord::from_classification("About", url.clone(), Classification::unclassified())
                .is_none()
        );

        let record = LinkRecord::from_classification(
            "Job",
            url,
            Classification::new(Category::Job, "9"),
        )
        .unwrap();
        assert_eq!(record.kind(), ContentKind::Job);
        assert_eq!(record.category(), Category::Job);
        assert_eq!(record.id(), "9");
    }
}
