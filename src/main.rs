//! # Blog Rewriter
//!
//! A batch pipeline that collects the oldest articles from a paginated blog
//! listing, stores them in a record store, and produces "optimized" rewrites
//! of them informed by top-ranking competitor articles.
//!
//! ## Features
//!
//! - Oldest-first discovery over a newest-first paginated listing
//! - Heuristic title/body extraction from unstructured article HTML
//! - Competitor search through SerpApi, Google Custom Search, and DuckDuckGo,
//!   degrading to a static result set when every provider fails
//! - Strict-JSON rewrites through an OpenAI-compatible chat API, with a
//!   deterministic template when the service is absent or misbehaves
//! - Optional JSON job reports
//!
//! ## Usage
//!
//! ```sh
//! blog_rewriter ingest
//! blog_rewriter rewrite
//! blog_rewriter --report-dir ./reports all
//! ```
//!
//! ## Architecture
//!
//! 1. **Ingest**: Discover the last listing page, collect the oldest article
//!    URLs, fetch and extract each, and store them as originals
//! 2. **Rewrite**: Pick the newest unprocessed original, find and scrape
//!    competitors, rewrite, and publish the result linked to its original

use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod api;
mod cli;
mod config;
mod extract;
mod http;
mod models;
mod outputs;
mod pipeline;
mod rewrite;
mod scrapers;
mod search;
mod store;
mod utils;

use api::{ChatClient, RetryAsk};
use cli::Cli;
use config::load_config;
use http::{build_client, build_client_with_timeout, HttpFetcher};
use outputs::report;
use pipeline::Pipeline;
use rewrite::RewriteEngine;
use search::SearchChain;
use store::{ArticleStore, HttpArticleStore, MemoryArticleStore};
use utils::ensure_writable_dir;

#[tokio::main(flavor = "current_thread")]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("blog_rewriter starting up");

    // Parse CLI
    let args = Cli::parse();
    let credentials = args.credentials();
    debug!(command = ?args.command, dry_run = args.dry_run, ?credentials, "Parsed CLI arguments");

    // ---- Load config ----
    let mut config = load_config(args.config.as_deref())?;
    if let Some(store_url) = &args.store_url {
        config.store_url = store_url.clone();
    }

    // Early check: ensure report dir is writable
    if let Some(report_dir) = &args.report_dir {
        if let Err(e) = ensure_writable_dir(report_dir).await {
            error!(
                path = %report_dir,
                error = %e,
                "Report directory is not writable (fix perms or choose a different path)"
            );
            return Err(e);
        }
    }

    // ---- Build clients ----
    let client = build_client(&config.http)?;
    let fetcher = HttpFetcher::new(client.clone());
    let chain = SearchChain::from_config(&config.search, &credentials, client.clone());

    let engine = match &credentials.rewrite_api_key {
        Some(key) => {
            let rewrite = &config.rewrite;
            let rewrite_client = build_client_with_timeout(
                &config.http,
                Duration::from_secs(rewrite.timeout_secs),
            )?;
            let chat = ChatClient::new(
                rewrite_client,
                &rewrite.endpoint,
                key,
                &rewrite.model,
                rewrite.temperature,
                rewrite.max_tokens,
            );
            info!(model = %rewrite.model, retries = rewrite.retries, "Rewrite service configured");
            RewriteEngine::new(Some(RetryAsk::new(
                chat,
                rewrite.retries,
                Duration::from_secs(1),
            )))
        }
        None => {
            info!("GROQ_API_KEY not set; rewrites will use the template");
            RewriteEngine::template_only()
        }
    };

    let store: Box<dyn ArticleStore> = if args.dry_run {
        info!("Dry run: using in-memory record store");
        Box::new(MemoryArticleStore::new())
    } else {
        info!(store_url = %config.store_url(), "Using record store");
        Box::new(HttpArticleStore::new(client, config.store_url()))
    };

    let pipeline = Pipeline {
        config: &config,
        fetcher: &fetcher,
        chain: &chain,
        store: store.as_ref(),
        engine: &engine,
    };

    // ---- Run jobs ----
    let deadline = args.job_timeout.map(Duration::from_secs);
    let mut failed = Vec::new();
    for &job in args.command.jobs() {
        let report = pipeline.run(job, deadline).await;

        if let Some(report_dir) = &args.report_dir {
            if let Err(e) = report::write_report(&report, report_dir).await {
                error!(%job, error = %e, "Failed to write job report");
            }
        }
        if report.is_failed() {
            failed.push(job);
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    if !failed.is_empty() {
        let jobs = failed.iter().map(|j| j.as_str()).collect::<Vec<_>>().join(", ");
        return Err(format!("job(s) failed: {}", jobs).into());
    }
    Ok(())
}
