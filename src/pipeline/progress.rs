/// Receives `(items_done, items_total)` while pages are being fetched.
pub trait ProgressSink: Send + Sync {
    fn report(&self, done: usize, total: usize);
}

impl<F> ProgressSink for F
where
    F: Fn(usize, usize) + Send + Sync,
{
    fn report(&self, done: usize, total: usize) {
        self(done, total)
    }
}
