//! Job orchestration: the ingest job and the rewrite job.
//!
//! Each job runs to completion and yields a [`JobReport`]. Per-item problems
//! (one article failing to fetch, one competitor failing to scrape) are
//! logged and counted; only conditions that make the whole job meaningless
//! (listing root or record store unreachable) mark the report as failed.

use crate::api::AskAsync;
use crate::config::PipelineConfig;
use crate::http::PageFetcher;
use crate::models::NewArticle;
use crate::rewrite::{RewriteEngine, RewritePath};
use crate::scrapers::blog;
use crate::search::{find_competitors, SearchChain};
use crate::store::{is_unreachable, latest_unprocessed, ArticleStore};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Serialize;
use std::error::Error;
use std::fmt;
use std::pin::pin;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, instrument, warn};

/// A batch job the pipeline can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Job {
    Ingest,
    Rewrite,
}

impl Job {
    pub fn as_str(&self) -> &'static str {
        match self {
            Job::Ingest => "ingest",
            Job::Rewrite => "rewrite",
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    /// The job did its work (possibly with skipped items).
    Completed,
    /// Nothing to do: no articles discovered, or nothing left to rewrite.
    NoWork,
    /// The rewrite was abandoned because no competitor article was usable.
    Aborted,
    /// A fatal-to-job condition; the process should exit non-zero.
    Failed,
}

/// Counts and identifiers describing one job run.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job: Job,
    pub outcome: JobOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub articles_discovered: usize,
    pub articles_ingested: usize,
    pub articles_skipped: usize,
    pub original_article_id: Option<String>,
    pub competitors_found: usize,
    pub rewrite_path: Option<RewritePath>,
    pub published_id: Option<String>,
    pub error: Option<String>,
}

impl JobReport {
    pub fn new(job: Job) -> Self {
        Self {
            job,
            outcome: JobOutcome::Completed,
            started_at: Utc::now(),
            finished_at: None,
            articles_discovered: 0,
            articles_ingested: 0,
            articles_skipped: 0,
            original_article_id: None,
            competitors_found: 0,
            rewrite_path: None,
            published_id: None,
            error: None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.outcome == JobOutcome::Failed
    }

    fn finish(&mut self, result: Result<(), Box<dyn Error>>) {
        if let Err(e) = result {
            self.outcome = JobOutcome::Failed;
            self.error = Some(e.to_string());
        }
        self.finished_at = Some(Utc::now());
    }
}

/// Everything a job needs, constructed once per run and borrowed by each job.
pub struct Pipeline<'a, A> {
    pub config: &'a PipelineConfig,
    pub fetcher: &'a dyn PageFetcher,
    pub chain: &'a SearchChain,
    pub store: &'a dyn ArticleStore,
    pub engine: &'a RewriteEngine<A>,
}

impl<A> Pipeline<'_, A>
where
    A: AskAsync<Response = String>,
{
    /// Run `job`, cancelling it at the next await point once `deadline`
    /// elapses. Counts gathered before cancellation stay in the report.
    pub async fn run(&self, job: Job, deadline: Option<Duration>) -> JobReport {
        let mut report = JobReport::new(job);
        let result = {
            let work = self.run_job(job, &mut report);
            match deadline {
                Some(limit) => match timeout(limit, work).await {
                    Ok(result) => result,
                    Err(_) => Err(format!("{} job exceeded its {:?} deadline", job, limit).into()),
                },
                None => work.await,
            }
        };
        report.finish(result);

        match (&report.outcome, &report.error) {
            (JobOutcome::Failed, Some(e)) => error!(%job, error = %e, "Job failed"),
            (outcome, _) => info!(
                %job,
                ?outcome,
                discovered = report.articles_discovered,
                ingested = report.articles_ingested,
                skipped = report.articles_skipped,
                competitors = report.competitors_found,
                published_id = report.published_id.as_deref().unwrap_or("-"),
                "Job finished"
            ),
        }
        report
    }

    async fn run_job(&self, job: Job, report: &mut JobReport) -> Result<(), Box<dyn Error>> {
        match job {
            Job::Ingest => self.ingest(report).await,
            Job::Rewrite => self.rewrite(report).await,
        }
    }

    /// Collect the oldest listing articles and store each as an original.
    #[instrument(level = "info", skip_all, fields(root = %self.config.listing.root()))]
    async fn ingest(&self, report: &mut JobReport) -> Result<(), Box<dyn Error>> {
        let delay = self.config.http.article_delay();
        let urls = blog::index_articles(self.fetcher, &self.config.listing, delay).await?;
        report.articles_discovered = urls.len();
        if urls.is_empty() {
            warn!("No article links found on the listing");
            report.outcome = JobOutcome::NoWork;
            return Ok(());
        }

        let mut articles = pin!(blog::fetch_articles(self.fetcher, urls, delay));
        let mut fetched = 0;
        while let Some(article) = articles.next().await {
            fetched += 1;
            let url = article.url.clone();
            match self
                .store
                .create_article(&NewArticle::ingested(article.content, &article.url))
                .await
            {
                Ok(stored) => {
                    info!(id = %stored.id, %url, title = %stored.title, "Ingested article");
                    report.articles_ingested += 1;
                }
                Err(e) if is_unreachable(e.as_ref()) => {
                    return Err(format!("record store unreachable: {}", e).into());
                }
                Err(e) => {
                    error!(error = %e, %url, "Failed to store article; skipping");
                    report.articles_skipped += 1;
                }
            }
        }
        report.articles_skipped += report.articles_discovered - fetched;
        info!(
            ingested = report.articles_ingested,
            skipped = report.articles_skipped,
            "Ingest finished"
        );
        Ok(())
    }

    /// Rewrite the newest unprocessed original against its top competitors
    /// and publish the result linked to it.
    #[instrument(level = "info", skip_all)]
    async fn rewrite(&self, report: &mut JobReport) -> Result<(), Box<dyn Error>> {
        let articles = self
            .store
            .list_articles()
            .await
            .map_err(|e| format!("record store unavailable: {}", e))?;
        let Some(original) = latest_unprocessed(&articles) else {
            info!(total = articles.len(), "No unprocessed articles");
            report.outcome = JobOutcome::NoWork;
            return Ok(());
        };
        info!(id = %original.id, title = %original.title, "Selected article for rewrite");
        report.original_article_id = Some(original.id.clone());

        let search = &self.config.search;
        let competitors = find_competitors(
            self.chain,
            self.fetcher,
            &original.title,
            search.competitor_count,
            search.provider_limit,
            self.config.http.scrape_delay(),
        )
        .await;
        report.competitors_found = competitors.len();
        if competitors.is_empty() {
            warn!(id = %original.id, "No competitor articles found; skipping rewrite");
            report.outcome = JobOutcome::Aborted;
            return Ok(());
        }

        let (output, path) = self.engine.rewrite(original, &competitors).await;
        report.rewrite_path = Some(path);

        let published = self
            .store
            .create_article(&NewArticle::generated(output))
            .await
            .map_err(|e| format!("failed to publish rewrite: {}", e))?;
        info!(
            id = %published.id,
            parent = %original.id,
            references = published.references.len(),
            ?path,
            "Published rewrite"
        );
        report.published_id = Some(published.id.clone());

        match self.store.get_article(&published.id).await {
            Ok(stored) if stored.parent_article_id.as_deref() == Some(original.id.as_str()) => {}
            Ok(stored) => warn!(
                id = %stored.id,
                expected = %original.id,
                actual = stored.parent_article_id.as_deref().unwrap_or("-"),
                "Stored rewrite has an unexpected parent link"
            ),
            Err(e) => warn!(id = %published.id, error = %e, "Could not read back published rewrite"),
        }
        Ok(())
    }
}
