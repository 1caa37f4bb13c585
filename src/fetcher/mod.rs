pub mod client;
pub mod decode;
pub mod errors;
pub mod types;

pub use client::HttpFetcher;
pub use errors::FetchError;
pub use types::{Charset, PageResponse};

use async_trait::async_trait;
use url::Url;

/// Retrieves a document by URL. Plain HTTP and browser rendering are both
/// implementations of this; callers never care which one they hold.
///
/// Implementations may report a non-2xx response either as an error or as an
/// `Ok` response carrying that status; callers check
/// [`PageResponse::is_success`] either way.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<PageResponse, FetchError>;
}
