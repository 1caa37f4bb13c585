//! Pagination walk over a listing site.
//!
//! The crawl is an explicit state machine:
//!
//! ```text
//! Fetching --2xx--> Extracting --> Paginating --control "n+1"--> Fetching
//!    |                                  |
//!    +--error / non-2xx--> Failed       +--no control / cap--> Done
//! ```
//!
//! Both terminal states return the links gathered so far.

use crate::classifier::{CompiledPatterns, LinkRecord};
use crate::document::{HtmlDocument, LabeledControl};
use crate::fetcher::DocumentFetcher;
use crate::patterns::PatternSet;
use crate::pipeline::ExecutionContext;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_PAGES: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    Done,
    Failed,
}

#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    /// Classified links in encounter order, duplicates included.
    pub links: Vec<LinkRecord>,
    pub terminal: Terminal,
    pub pages_visited: u32,
}

#[derive(Debug)]
enum CrawlState {
    Fetching {
        url: Url,
        page: u32,
    },
    Extracting {
        url: Url,
        body: String,
        page: u32,
    },
    Paginating {
        page: u32,
        control: Option<LabeledControl>,
    },
    Done,
    Failed,
}

/// What one listing page yields: its classified links and the control for
/// the following page, if any.
struct ScannedPage {
    links: Vec<LinkRecord>,
    next_control: Option<LabeledControl>,
}

fn scan_page(body: &str, url: &Url, patterns: &CompiledPatterns, next_page: u32) -> ScannedPage {
    let document = HtmlDocument::parse(body);
    let anchors = document.links(url);
    let anchor_count = anchors.len();

    let links: Vec<LinkRecord> = anchors
        .into_iter()
        .filter_map(|anchor| {
            let classification = patterns.classify(anchor.href.as_str());
            let record = LinkRecord::from_classification(anchor.text, anchor.href, classification)?;
            debug!(url = %record.url(), kind = %record.kind(), id = record.id(), "link matched");
            Some(record)
        })
        .collect();

    debug!(url = %url, anchors = anchor_count, matched = links.len(), "page scanned");

    ScannedPage {
        links,
        next_control: document.find_by_label(&next_page.to_string(), url),
    }
}

pub struct PageCrawler {
    fetcher: Arc<dyn DocumentFetcher>,
    page_delay: Duration,
    max_pages: u32,
}

impl PageCrawler {
    pub fn new(fetcher: Arc<dyn DocumentFetcher>) -> Self {
        Self {
            fetcher,
            page_delay: DEFAULT_PAGE_DELAY,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    pub fn with_page_delay(mut self, page_delay: Duration) -> Self {
        self.page_delay = page_delay;
        self
    }

    /// Highest page number that will be fetched. `0` disables the cap.
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub async fn crawl(
        &self,
        ctx: &ExecutionContext,
        base_url: &Url,
        patterns: &PatternSet,
    ) -> CrawlOutcome {
        info!(base_url = %base_url, "starting crawl");
        let compiled = CompiledPatterns::compile(patterns);
        let mut links = Vec::new();
        let mut pages_visited = 0;
        let mut state = CrawlState::Fetching {
            url: base_url.clone(),
            page: 1,
        };

        loop {
            state = match state {
                CrawlState::Fetching { url, page } => {
                    if ctx.is_cancelled() {
                        info!(page, "crawl cancelled");
                        CrawlState::Done
                    } else {
                        self.fetch_page(url, page).await
                    }
                }
                CrawlState::Extracting { url, body, page } => {
                    pages_visited += 1;
                    let scanned = scan_page(&body, &url, &compiled, page + 1);
                    info!(page, url = %url, found = scanned.links.len(), "listing page processed");
                    links.extend(scanned.links);
                    CrawlState::Paginating {
                        page,
                        control: scanned.next_control,
                    }
                }
                CrawlState::Paginating { page, control } => self.paginate(ctx, page, control).await,
                CrawlState::Done => {
                    info!(pages = pages_visited, links = links.len(), "crawl finished");
                    return CrawlOutcome {
                        links,
                        terminal: Terminal::Done,
                        pages_visited,
                    };
                }
                CrawlState::Failed => {
                    warn!(pages = pages_visited, links = links.len(), "crawl ended early");
                    return CrawlOutcome {
                        links,
                        terminal: Terminal::Failed,
                        pages_visited,
                    };
                }
            }
        }
    }

    async fn fetch_page(&self, url: Url, page: u32) -> CrawlState {
        debug!(page, url = %url, "fetching listing page");
        match self.fetcher.fetch(&url).await {
            Ok(response) if response.is_success() => CrawlState::Extracting {
                url: response.url_final,
                body: response.body_utf8,
                page,
            },
            Ok(response) => {
                error!(page, url = %url, stage = "crawl", status = %response.status, "listing page not retrieved");
                CrawlState::Failed
            }
            Err(e) => {
                error!(page, url = %url, stage = "crawl", error = %e, "listing page not retrieved");
                CrawlState::Failed
            }
        }
    }

    async fn paginate(
        &self,
        ctx: &ExecutionContext,
        page: u32,
        control: Option<LabeledControl>,
    ) -> CrawlState {
        let next = match control {
            Some(LabeledControl {
                target: Some(target),
                ..
            }) => target,
            Some(_) => {
                info!(page, "next-page control has no target");
                return CrawlState::Done;
            }
            None => {
                info!(page, "no next page found");
                return CrawlState::Done;
            }
        };

        if self.max_pages != 0 && page >= self.max_pages {
            warn!(page, max_pages = self.max_pages, next = %next, "page cap reached, stopping");
            return CrawlState::Done;
        }

        tokio::select! {
            _ = ctx.cancellation().cancelled() => {
                info!(page, "crawl cancelled");
                return CrawlState::Done;
            }
            _ = tokio::time::sleep(self.page_delay) => {}
        }

        CrawlState::Fetching {
            url: next,
            page: page + 1,
        }
    }
}
