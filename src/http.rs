//! HTTP plumbing shared by every external fetch.
//!
//! A single [`reqwest::Client`] is built per run from [`HttpConfig`] and passed
//! into each component; nothing is process-global. Connections are not kept
//! alive between requests since every target host is uncontrolled.
//!
//! Components that only need "GET this URL as HTML" depend on the
//! [`PageFetcher`] trait so tests can substitute canned pages.

use crate::config::HttpConfig;
use async_trait::async_trait;
use reqwest::Client;
use std::error::Error;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

/// Build the per-run HTTP client: bounded timeout, browser user agent, no idle
/// connection pool.
pub fn build_client(config: &HttpConfig) -> Result<Client, Box<dyn Error>> {
    build_client_with_timeout(config, config.timeout())
}

/// Same as [`build_client`] with an explicit timeout, for services that need a
/// longer deadline than page fetches (the rewrite endpoint).
pub fn build_client_with_timeout(
    config: &HttpConfig,
    timeout: Duration,
) -> Result<Client, Box<dyn Error>> {
    let client = Client::builder()
        .timeout(timeout)
        .user_agent(config.user_agent.clone())
        .pool_max_idle_per_host(0)
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()?;
    Ok(client)
}

/// Fetch a page and return its body as text.
#[async_trait(?Send)]
pub trait PageFetcher {
    async fn fetch_html(&self, url: &str) -> Result<String, Box<dyn Error>>;
}

/// [`PageFetcher`] backed by a real HTTP client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait(?Send)]
impl PageFetcher for HttpFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn fetch_html(&self, url: &str) -> Result<String, Box<dyn Error>> {
        let t0 = Instant::now();
        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        debug!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched page"
        );
        Ok(body)
    }
}
