use anyhow::{Context, Result};
use pagesift::{ExecutionContext, Pipeline, ProgressSink, config::Config};
use std::io::Write;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use url::Url;

const ENV_LOG_FORMAT: &str = "LOG_FORMAT";

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    // Logs go to stderr; stdout carries the records.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if std::env::var(ENV_LOG_FORMAT).is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let base_url = std::env::args()
        .nth(1)
        .context("usage: pagesift <listing-url>")?;
    let base_url = Url::parse(&base_url).with_context(|| format!("invalid listing url {base_url:?}"))?;

    let config = Config::from_env()?;
    let pipeline = Pipeline::from_config(&config)?;

    let shutdown_token = CancellationToken::new();
    let ctx = ExecutionContext::new(config.request_delay()).with_cancellation(shutdown_token.clone());

    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Received shutdown signal, finishing in-flight work...");
        shutdown_token.cancel();
    });

    let progress: Arc<dyn ProgressSink> = Arc::new(|done: usize, total: usize| {
        info!(done, total, "pages fetched");
    });

    info!(run_id = %ctx.run_id(), base_url = %base_url, "starting");
    let report = pipeline.run(&ctx, &base_url, Some(progress)).await;

    let mut stdout = std::io::stdout().lock();
    for record in &report.records {
        serde_json::to_writer(&mut stdout, record)?;
        writeln!(stdout)?;
    }
    stdout.flush()?;

    for source in &report.provenance {
        debug!(url = %source.url, checksum = %source.checksum, fetched_at = %source.fetched_at, "record source");
    }

    info!(
        terminal = ?report.terminal,
        listing_pages = report.pages_visited,
        links = report.links_found,
        records = report.records.len(),
        "done"
    );
    Ok(())
}
