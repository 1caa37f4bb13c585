//! Retrieval of the pages behind classified links.

use crate::classifier::LinkRecord;
use crate::fetcher::{DocumentFetcher, FetchError, PageResponse};
use crate::llm::RetryPolicy;
use crate::pipeline::{ExecutionContext, ProgressSink, pool::run_ordered};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};
use url::Url;

/// A link together with the document it points to.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub link: LinkRecord,
    pub raw_content: String,
    /// Hex md5 of the raw body.
    pub checksum: String,
    pub fetched_at: DateTime<Utc>,
}

/// Where a record's content came from and when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageProvenance {
    pub url: Url,
    pub checksum: String,
    pub fetched_at: DateTime<Utc>,
}

impl FetchedPage {
    pub fn provenance(&self) -> PageProvenance {
        PageProvenance {
            url: self.link.url().clone(),
            checksum: self.checksum.clone(),
            fetched_at: self.fetched_at,
        }
    }
}

#[derive(Clone)]
pub struct ContentFetcher {
    fetcher: Arc<dyn DocumentFetcher>,
    concurrency: usize,
    retry: RetryPolicy,
}

impl ContentFetcher {
    pub fn new(fetcher: Arc<dyn DocumentFetcher>) -> Self {
        Self {
            fetcher,
            concurrency: 1,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Fetch one page. Transient failures are retried; anything left over is
    /// logged and yields `None`.
    pub async fn fetch(&self, ctx: &ExecutionContext, link: &LinkRecord) -> Option<FetchedPage> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        let response = loop {
            tokio::select! {
                biased;
                _ = ctx.cancellation().cancelled() => return None,
                _ = ctx.politeness().acquire() => {}
            }

            match self.fetch_once(link.url()).await {
                Ok(response) => break response,
                Err(e) if e.should_retry() && attempt < max_attempts => {
                    let delay = self.retry.delay_after(attempt);
                    warn!(
                        url = %link.url(),
                        stage = "content",
                        error = %e,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "page fetch failed, retrying"
                    );
                    tokio::select! {
                        _ = ctx.cancellation().cancelled() => return None,
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(e) => {
                    warn!(url = %link.url(), stage = "content", error = %e, attempt, "page fetch failed");
                    return None;
                }
            }
        };

        debug!(
            url = %link.url(),
            size = response.body_utf8.len(),
            charset = ?response.charset,
            "page fetched"
        );

        Some(FetchedPage {
            link: link.clone(),
            checksum: response.checksum(),
            fetched_at: response.fetched_at,
            raw_content: response.body_utf8,
        })
    }

    /// Non-2xx answers count as failures whatever the fetcher reports.
    async fn fetch_once(&self, url: &Url) -> Result<PageResponse, FetchError> {
        let response = self.fetcher.fetch(url).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(FetchError::Status {
                status: response.status,
            })
        }
    }

    /// Fetch every link, keeping input order. Failed items are left out;
    /// they never stop the batch. `progress` hears about every finished
    /// item, failed or not.
    pub async fn fetch_all(
        &self,
        ctx: &ExecutionContext,
        links: &[LinkRecord],
        progress: Option<Arc<dyn ProgressSink>>,
    ) -> Vec<FetchedPage> {
        let total = links.len();
        info!(total, concurrency = self.concurrency, "fetching pages");
        let done = Arc::new(AtomicUsize::new(0));

        let slots = run_ordered(
            links.to_vec(),
            self.concurrency,
            ctx.cancellation(),
            ctx.span(),
            |_, link| {
                let this = self.clone();
                let ctx = ctx.clone();
                let done = done.clone();
                let progress = progress.clone();
                async move {
                    let page = this.fetch(&ctx, &link).await;
                    let finished = done.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(progress) = progress {
                        progress.report(finished, total);
                    }
                    page
                }
            },
        )
        .await;

        let pages: Vec<FetchedPage> = slots.into_iter().flatten().collect();
        info!(total, fetched = pages.len(), "page fetch finished");
        pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{Category, Classification};
    use crate::fetcher::{FetchError, PageResponse};
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;
    use url::Url;

    /// `/fail` answers 500, `/gone` 404, `/down` times out, `/flaky` times
    /// out on its first request only. Everything else is a page naming its
    /// path.
    struct FakeSite {
        requested: Mutex<Vec<String>>,
    }

    impl FakeSite {
        fn hits(&self, path: &str) -> usize {
            self.requested
                .lock()
                .unwrap()
                .iter()
                .filter(|p| p.as_str() == path)
                .count()
        }
    }

    #[async_trait]
    impl DocumentFetcher for FakeSite {
        async fn fetch(&self, url: &Url) -> Result<PageResponse, FetchError> {
            let path = url.path().to_string();
            let seen_before = {
                let mut requested = self.requested.lock().unwrap();
                let seen = requested.contains(&path);
                requested.push(path.clone());
                seen
            };
            match path.as_str() {
                p if p.starts_with("/fail") => Ok(PageResponse::from_html(
                    url.clone(),
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "oops",
                )),
                p if p.starts_with("/gone") => Ok(PageResponse::from_html(
                    url.clone(),
                    StatusCode::NOT_FOUND,
                    "",
                )),
                p if p.starts_with("/down") => Err(FetchError::RequestTimeout),
                p if p.starts_with("/flaky") && !seen_before => Err(FetchError::RequestTimeout),
                _ => Ok(PageResponse::from_html(
                    url.clone(),
                    StatusCode::OK,
                    format!("<html><body>{path}</body></html>"),
                )),
            }
        }
    }

    fn site() -> Arc<FakeSite> {
        Arc::new(FakeSite {
            requested: Mutex::new(Vec::new()),
        })
    }

    fn quick_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::ZERO,
        }
    }

    fn fetcher(site: Arc<FakeSite>) -> ContentFetcher {
        ContentFetcher::new(site).with_retry(quick_retry(3))
    }

    fn job(path: &str) -> LinkRecord {
        LinkRecord::from_classification(
            path,
            Url::parse("https://jobs.example.com").unwrap().join(path).unwrap(),
            Classification {
                category: Category::Job,
                id: String::new(),
            },
        )
        .unwrap()
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(Duration::ZERO)
    }

    #[tokio::test]
    async fn failed_item_is_dropped_and_batch_continues() {
        let fetcher = fetcher(site());
        let links = vec![job("/a"), job("/fail"), job("/c")];
        let pages = fetcher.fetch_all(&ctx(), &links, None).await;

        let paths: Vec<&str> = pages.iter().map(|p| p.link.url().path()).collect();
        assert_eq!(paths, vec!["/a", "/c"]);
        assert!(pages[0].raw_content.contains("/a"));
        assert_eq!(pages[0].checksum.len(), 32);
    }

    #[tokio::test]
    async fn transient_failure_is_retried() {
        let site = site();
        let page = fetcher(site.clone()).fetch(&ctx(), &job("/flaky")).await;

        assert!(page.unwrap().raw_content.contains("/flaky"));
        assert_eq!(site.hits("/flaky"), 2);
    }

    #[tokio::test]
    async fn retries_stop_after_max_attempts() {
        let site = site();
        assert!(fetcher(site.clone()).fetch(&ctx(), &job("/down")).await.is_none());
        assert_eq!(site.hits("/down"), 3);

        assert!(fetcher(site.clone()).fetch(&ctx(), &job("/fail")).await.is_none());
        assert_eq!(site.hits("/fail"), 3);
    }

    #[tokio::test]
    async fn client_error_is_not_retried() {
        let site = site();
        assert!(fetcher(site.clone()).fetch(&ctx(), &job("/gone")).await.is_none());
        assert_eq!(site.hits("/gone"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_waits_for_backoff() {
        let site = site();
        let fetcher = ContentFetcher::new(site.clone()).with_retry(RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_secs(10),
        });
        let start = tokio::time::Instant::now();
        assert!(fetcher.fetch(&ctx(), &job("/flaky")).await.is_some());
        // ±30% jitter on the first backoff step
        assert!(start.elapsed() >= Duration::from_secs(7));
    }

    #[tokio::test]
    async fn provenance_matches_fetch() {
        let page = fetcher(site()).fetch(&ctx(), &job("/a")).await.unwrap();
        let provenance = page.provenance();
        assert_eq!(provenance.url.path(), "/a");
        assert_eq!(provenance.checksum, page.checksum);
        assert_eq!(provenance.fetched_at, page.fetched_at);
    }

    #[tokio::test]
    async fn progress_reports_every_item() {
        let fetcher = fetcher(site());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        let sink: Arc<dyn ProgressSink> = Arc::new(move |done: usize, total: usize| {
            sink_seen.lock().unwrap().push((done, total));
        });

        let links = vec![job("/a"), job("/fail"), job("/c")];
        fetcher.fetch_all(&ctx(), &links, Some(sink)).await;

        assert_eq!(*seen.lock().unwrap(), vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[tokio::test]
    async fn concurrent_fetch_keeps_order() {
        let fetcher = fetcher(site()).with_concurrency(4);
        let links: Vec<LinkRecord> = (0..8).map(|i| job(&format!("/p{i}"))).collect();
        let pages = fetcher.fetch_all(&ctx(), &links, None).await;
        let paths: Vec<String> = pages.iter().map(|p| p.link.url().path().to_string()).collect();
        let expected: Vec<String> = (0..8).map(|i| format!("/p{i}")).collect();
        assert_eq!(paths, expected);
    }

    #[tokio::test]
    async fn cancelled_run_fetches_nothing() {
        let site = site();
        let fetcher = fetcher(site.clone());
        let token = CancellationToken::new();
        token.cancel();
        let ctx = ctx().with_cancellation(token);

        let pages = fetcher.fetch_all(&ctx, &[job("/a"), job("/b")], None).await;
        assert!(pages.is_empty());
        assert!(site.requested.lock().unwrap().is_empty());
    }
}
