//! End-to-end run: patterns, crawl, page fetch, chunked extraction and
//! reconciliation.

pub mod context;
pub mod pool;
pub mod progress;
pub mod rate_limit;

pub use context::ExecutionContext;
pub use progress::ProgressSink;
pub use rate_limit::RateLimiter;

use crate::chunker::{DEFAULT_CHUNK_SIZE, chunk};
use crate::config::Config;
use crate::content::{ContentFetcher, FetchedPage, PageProvenance};
use crate::crawler::{DEFAULT_MAX_PAGES, DEFAULT_PAGE_DELAY, PageCrawler, Terminal};
use crate::document::visible_text;
use crate::extraction::{ExtractedRecord, ExtractionClient};
use crate::fetcher::{DocumentFetcher, HttpFetcher};
use crate::llm::{CompletionBackend, CompletionSettings, RetryPolicy, TogetherClient};
use crate::patterns::{LlmPatternOracle, PatternOracle, PatternSet, StaticPatternOracle, resolve_patterns};
use crate::reconcile::reconcile;
use anyhow::Context;
use pool::run_ordered;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, debug, info};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    pub chunk_size: usize,
    pub page_delay: Duration,
    /// `0` disables the cap.
    pub max_pages: u32,
    pub concurrency: usize,
    /// Retries for transiently failing page fetches.
    pub fetch_retry: RetryPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            page_delay: DEFAULT_PAGE_DELAY,
            max_pages: DEFAULT_MAX_PAGES,
            concurrency: 1,
            fetch_retry: RetryPolicy::default(),
        }
    }
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunk_size: config.chunk_size(),
            page_delay: config.page_delay(),
            max_pages: config.max_pages(),
            concurrency: config.concurrency(),
            fetch_retry: config.fetch_retry_policy(),
        }
    }
}

/// Summary of one run. `records` is in link encounter order, one per page
/// that was fetched and fully extracted.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub patterns: PatternSet,
    pub terminal: Terminal,
    pub pages_visited: u32,
    pub links_found: usize,
    pub pages_fetched: usize,
    pub records: Vec<ExtractedRecord>,
    /// One entry per record, same order.
    pub provenance: Vec<PageProvenance>,
}

pub struct Pipeline {
    oracle: Arc<dyn PatternOracle>,
    fetcher: Arc<dyn DocumentFetcher>,
    extractor: ExtractionClient,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        oracle: Arc<dyn PatternOracle>,
        fetcher: Arc<dyn DocumentFetcher>,
        extractor: ExtractionClient,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            oracle,
            fetcher,
            extractor,
            settings,
        }
    }

    /// Wire the production components: Together backend, plain-HTTP fetcher,
    /// and either the configured patterns or the LLM oracle.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let api_key = config
            .together_api_key()
            .context("TOGETHER_API_KEY is not set")?;
        let backend: Arc<dyn CompletionBackend> = Arc::new(
            TogetherClient::new(config.together_base_url(), api_key, config.extraction_timeout())
                .context("building completion client")?,
        );
        let completion = CompletionSettings {
            model: config.model().to_string(),
            max_tokens: config.max_tokens(),
            temperature: config.temperature(),
        };

        let oracle: Arc<dyn PatternOracle> = match config.patterns() {
            Some(patterns) => Arc::new(StaticPatternOracle::new(patterns.clone())),
            None => Arc::new(LlmPatternOracle::new(backend.clone(), completion.clone())),
        };

        let extractor = ExtractionClient::new(backend, completion)
            .with_timeout(config.extraction_timeout())
            .with_retry(config.retry_policy());

        Ok(Self::new(
            oracle,
            Arc::new(HttpFetcher::shared()),
            extractor,
            PipelineSettings::from_config(config),
        ))
    }

    pub async fn run(
        &self,
        ctx: &ExecutionContext,
        base_url: &Url,
        progress: Option<Arc<dyn ProgressSink>>,
    ) -> PipelineReport {
        self.run_stages(ctx, base_url, progress)
            .instrument(ctx.span().clone())
            .await
    }

    async fn run_stages(
        &self,
        ctx: &ExecutionContext,
        base_url: &Url,
        progress: Option<Arc<dyn ProgressSink>>,
    ) -> PipelineReport {
        info!(base_url = %base_url, "run started");
        let patterns = resolve_patterns(self.oracle.as_ref(), base_url).await;

        let crawl = PageCrawler::new(self.fetcher.clone())
            .with_page_delay(self.settings.page_delay)
            .with_max_pages(self.settings.max_pages)
            .crawl(ctx, base_url, &patterns)
            .await;

        let pages = ContentFetcher::new(self.fetcher.clone())
            .with_concurrency(self.settings.concurrency)
            .with_retry(self.settings.fetch_retry)
            .fetch_all(ctx, &crawl.links, progress)
            .await;
        let pages_fetched = pages.len();

        let (records, provenance): (Vec<_>, Vec<_>) =
            self.extract_all(ctx, pages).await.into_iter().unzip();
        info!(
            links = crawl.links.len(),
            pages = pages_fetched,
            records = records.len(),
            "run finished"
        );

        PipelineReport {
            patterns,
            terminal: crawl.terminal,
            pages_visited: crawl.pages_visited,
            links_found: crawl.links.len(),
            pages_fetched,
            records,
            provenance,
        }
    }

    async fn extract_all(
        &self,
        ctx: &ExecutionContext,
        pages: Vec<FetchedPage>,
    ) -> Vec<(ExtractedRecord, PageProvenance)> {
        let chunk_size = self.settings.chunk_size;
        run_ordered(
            pages,
            self.settings.concurrency,
            ctx.cancellation(),
            ctx.span(),
            |_, page| {
                let extractor = self.extractor.clone();
                let ctx = ctx.clone();
                async move {
                    let provenance = page.provenance();
                    let record = extract_page(&extractor, &ctx, chunk_size, page).await?;
                    Some((record, provenance))
                }
            },
        )
        .await
        .into_iter()
        .flatten()
        .collect()
    }
}

/// Chunks of one page go through the backend strictly in order. A page whose
/// extraction is interrupted by cancellation yields nothing.
async fn extract_page(
    extractor: &ExtractionClient,
    ctx: &ExecutionContext,
    chunk_size: usize,
    page: FetchedPage,
) -> Option<ExtractedRecord> {
    let kind = page.link.kind();
    let chunks = chunk(&visible_text(&page.raw_content), chunk_size);
    debug!(url = %page.link.url(), chunks = chunks.len(), "extracting page");

    let mut partials = Vec::with_capacity(chunks.len());
    for (index, text) in chunks.iter().enumerate() {
        if ctx.is_cancelled() {
            info!(url = %page.link.url(), chunk = index, "page dropped after cancellation");
            return None;
        }
        let partial = extractor.extract(ctx, kind, text).await;
        debug!(url = %page.link.url(), chunk = index, extracted = partial.is_some(), "chunk done");
        partials.push(partial);
    }
    if ctx.is_cancelled() {
        info!(url = %page.link.url(), "page dropped after cancellation");
        return None;
    }

    Some(reconcile(&page.link, &partials))
}
