//! Field extraction from page text through a completion backend.

pub mod parse;
pub mod prompt;
pub mod record;

pub use parse::ParseError;
pub use record::{ArticleRecord, ExtractedRecord, JobRecord};

use crate::classifier::ContentKind;
use crate::llm::{CompletionBackend, CompletionRequest, CompletionSettings, LlmError, RetryPolicy};
use crate::pipeline::ExecutionContext;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_EXTRACTION_TIMEOUT: Duration = Duration::from_secs(60);

/// Turns one chunk of page text into a partial record.
///
/// Never fails: backend errors, timeouts and unparseable output all come back
/// as `None` after being logged.
#[derive(Clone)]
pub struct ExtractionClient {
    backend: Arc<dyn CompletionBackend>,
    settings: CompletionSettings,
    timeout: Duration,
    retry: RetryPolicy,
}

impl ExtractionClient {
    pub fn new(backend: Arc<dyn CompletionBackend>, settings: CompletionSettings) -> Self {
        Self {
            backend,
            settings,
            timeout: DEFAULT_EXTRACTION_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn extract(
        &self,
        ctx: &ExecutionContext,
        kind: ContentKind,
        chunk: &str,
    ) -> Option<ExtractedRecord> {
        let request = self.settings.request(prompt::for_chunk(kind, chunk));
        let raw = self.complete_with_retry(ctx, &request).await?;
        debug!(kind = %kind, response = %raw, "extraction response");

        match parse::parse_partial(kind, &raw) {
            Ok(partial) => Some(partial),
            Err(e) => {
                warn!(kind = %kind, error = %e, response = %raw, "unusable extraction response");
                None
            }
        }
    }

    async fn complete_once(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        match tokio::time::timeout(self.timeout, self.backend.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout(self.timeout)),
        }
    }

    async fn complete_with_retry(
        &self,
        ctx: &ExecutionContext,
        request: &CompletionRequest,
    ) -> Option<String> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            if ctx.is_cancelled() {
                debug!("extraction skipped, run cancelled");
                return None;
            }

            match self.complete_once(request).await {
                Ok(text) => return Some(text),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = self.retry.delay_after(attempt);
                    warn!(
                        error = %e,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "extraction backend call failed, retrying"
                    );
                    tokio::select! {
                        _ = ctx.cancellation().cancelled() => return None,
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(e) => {
                    warn!(error = %e, attempt, "extraction backend call failed");
                    return None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockCompletionBackend;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use tokio_util::sync::CancellationToken;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(Duration::ZERO)
    }

    fn client(backend: MockCompletionBackend, retry: RetryPolicy) -> ExtractionClient {
        ExtractionClient::new(Arc::new(backend), CompletionSettings::default()).with_retry(retry)
    }

    fn quick_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn parses_backend_output() {
        let mut backend = MockCompletionBackend::new();
        backend
            .expect_complete()
            .withf(|req| req.prompt.contains("Wir suchen Azubis") && req.temperature == 0.2)
            .times(1)
            .returning(|_| Ok(r#"Result: {"Company": "Bosch", "Position": "Mechatroniker"}"#.to_string()));

        let partial = client(backend, RetryPolicy::none())
            .extract(&ctx(), ContentKind::Job, "Wir suchen Azubis")
            .await
            .unwrap();

        match partial {
            ExtractedRecord::Job(job) => {
                assert_eq!(job.company, "Bosch");
                assert_eq!(job.position, "Mechatroniker");
            }
            other => panic!("expected job record, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn response_without_object_is_absent() {
        let mut backend = MockCompletionBackend::new();
        backend
            .expect_complete()
            .returning(|_| Ok("Sorry, nothing to extract here.".to_string()));

        let partial = client(backend, RetryPolicy::none())
            .extract(&ctx(), ContentKind::Article, "text")
            .await;
        assert!(partial.is_none());
    }

    #[tokio::test]
    async fn transient_errors_are_retried() {
        let mut backend = MockCompletionBackend::new();
        let mut seq = mockall::Sequence::new();
        backend
            .expect_complete()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(LlmError::RateLimited));
        backend
            .expect_complete()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(r#"{"Title": "Second try"}"#.to_string()));

        let partial = client(backend, quick_retry(3))
            .extract(&ctx(), ContentKind::Article, "text")
            .await;
        assert!(matches!(partial, Some(ExtractedRecord::Article(a)) if a.title == "Second try"));
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let mut backend = MockCompletionBackend::new();
        backend
            .expect_complete()
            .times(1)
            .returning(|_| Err(LlmError::Unauthorized(StatusCode::UNAUTHORIZED)));

        let partial = client(backend, quick_retry(5))
            .extract(&ctx(), ContentKind::Job, "text")
            .await;
        assert!(partial.is_none());
    }

    #[tokio::test]
    async fn retries_stop_at_max_attempts() {
        let mut backend = MockCompletionBackend::new();
        backend.expect_complete().times(3).returning(|_| {
            Err(LlmError::Status {
                status: StatusCode::SERVICE_UNAVAILABLE,
                body: String::new(),
            })
        });

        let partial = client(backend, quick_retry(3))
            .extract(&ctx(), ContentKind::Job, "text")
            .await;
        assert!(partial.is_none());
    }

    #[tokio::test]
    async fn cancelled_context_issues_no_calls() {
        let mut backend = MockCompletionBackend::new();
        backend.expect_complete().never();

        let token = CancellationToken::new();
        token.cancel();
        let ctx = ctx().with_cancellation(token);

        let partial = client(backend, RetryPolicy::none())
            .extract(&ctx, ContentKind::Job, "text")
            .await;
        assert!(partial.is_none());
    }

    struct SlowBackend;

    #[async_trait]
    impl CompletionBackend for SlowBackend {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String, LlmError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("{}".to_string())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_counts_as_failure() {
        let client = ExtractionClient::new(Arc::new(SlowBackend), CompletionSettings::default())
            .with_timeout(Duration::from_millis(50))
            .with_retry(RetryPolicy::none());

        let partial = client.extract(&ctx(), ContentKind::Article, "text").await;
        assert!(partial.is_none());
    }
}
