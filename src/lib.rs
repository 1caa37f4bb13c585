pub mod chunker;
pub mod classifier;
pub mod config;
pub mod content;
pub mod crawler;
pub mod document;
pub mod extraction;
pub mod fetcher;
pub mod llm;
pub mod patterns;
pub mod pipeline;
pub mod reconcile;

pub use classifier::{Category, Classification, ContentKind, LinkRecord, classify};
pub use content::{ContentFetcher, FetchedPage, PageProvenance};
pub use crawler::{CrawlOutcome, PageCrawler, Terminal};
pub use extraction::{ExtractedRecord, ExtractionClient};
pub use patterns::PatternSet;
pub use pipeline::{ExecutionContext, Pipeline, PipelineReport, ProgressSink};
