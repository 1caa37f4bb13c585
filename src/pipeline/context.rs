use crate::pipeline::rate_limit::RateLimiter;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{Span, info_span};
use uuid::Uuid;

/// Per-run state handed to every stage: the run's tracing span, the shared
/// politeness limiter for the target site, and the cancellation token.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    run_id: Uuid,
    span: Span,
    politeness: Arc<RateLimiter>,
    cancel: CancellationToken,
}

impl ExecutionContext {
    pub fn new(request_delay: Duration) -> Self {
        let run_id = Uuid::new_v4();
        Self {
            run_id,
            span: info_span!("run", run_id = %run_id),
            politeness: Arc::new(RateLimiter::new(request_delay)),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn politeness(&self) -> &RateLimiter {
        &self.politeness
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
