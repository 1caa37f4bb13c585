use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, error};

/// Run `task` over `items` with at most `concurrency` in flight. Results are
/// returned at the index of their input; `None` marks an item that failed,
/// was never started because of cancellation, or whose task panicked.
///
/// Items are started in input order. Once `cancel` fires no new item starts;
/// the ones already running are awaited.
pub async fn run_ordered<I, R, F, Fut>(
    items: Vec<I>,
    concurrency: usize,
    cancel: &CancellationToken,
    span: &Span,
    task: F,
) -> Vec<Option<R>>
where
    I: Send + 'static,
    R: Send + 'static,
    F: Fn(usize, I) -> Fut,
    Fut: Future<Output = Option<R>> + Send + 'static,
{
    let mut slots: Vec<Option<R>> = (0..items.len()).map(|_| None).collect();
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut workers = JoinSet::new();

    for (index, item) in items.into_iter().enumerate() {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            permit = semaphore.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let work = task(index, item);
        workers.spawn(
            async move {
                let _permit = permit; // Hold permit until the item completes
                (index, work.await)
            }
            .instrument(span.clone()),
        );
    }

    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok((index, result)) => slots[index] = result,
            Err(e) => error!(error = %e, "worker task aborted"),
        }
    }

    slots
}
