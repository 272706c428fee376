//! Listing-site scraper: oldest-first article discovery and content fetch.
//!
//! The listing shows articles newest-first, paginated as
//! `{root}/page/{N}/` with page 1 at the root. To find the oldest articles the
//! scraper:
//!
//! 1. Reads the root page and takes the highest page index linked from the
//!    pagination anchors ([`discover_last_page`]).
//! 2. Walks pages from that index down to 1, reversing each page's links so
//!    the accumulated list runs oldest to newest ([`collect_oldest`]).
//! 3. Fetches and extracts each collected article ([`fetch_articles`]).

use crate::config::ListingConfig;
use crate::extract::{extract, ExtractionProfile};
use crate::http::PageFetcher;
use crate::models::ExtractedContent;
use futures::stream::{self, Stream, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::error::Error;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

static PAGE_INDEX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/page/(\d+)").expect("valid page index regex"));

/// An article fetched and extracted from the listing site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlogArticle {
    pub url: String,
    pub content: ExtractedContent,
}

/// Highest page index linked from the pagination anchors in `html`, or 1.
pub fn max_page_index(html: &str, listing: &ListingConfig) -> u32 {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse(&listing.pagination_selector) else {
        warn!(selector = %listing.pagination_selector, "Invalid pagination selector");
        return 1;
    };
    document
        .select(&selector)
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| PAGE_INDEX_RE.captures(href))
        .filter_map(|caps| caps[1].parse::<u32>().ok())
        .fold(1, u32::max)
}

/// Article detail links on one listing page, in page order.
///
/// Links are resolved against `page_url`, must start with the configured
/// article prefix, and must not be pagination or tag links. Duplicates within
/// the page are dropped.
pub fn article_links(html: &str, page_url: &str, listing: &ListingConfig) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse(&listing.article_link_selector) else {
        warn!(selector = %listing.article_link_selector, "Invalid article link selector");
        return Vec::new();
    };
    let Ok(base) = Url::parse(page_url) else {
        warn!(%page_url, "Listing page URL is not absolute");
        return Vec::new();
    };
    let prefix = listing.article_prefix();

    let mut seen = HashSet::new();
    document
        .select(&selector)
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| base.join(href).ok())
        .map(|mut url| {
            url.set_fragment(None);
            url.to_string()
        })
        .filter(|url| url.starts_with(&prefix) && url.len() > prefix.len())
        .filter(|url| !url.contains("/page/") && !url.contains("/tag/"))
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

/// Fetch the listing root and return its highest page index.
///
/// # Errors
///
/// A failure to fetch the root is returned to the caller; without the listing
/// there is nothing to ingest.
#[instrument(level = "info", skip_all, fields(root = %listing.root()))]
pub async fn discover_last_page(
    fetcher: &dyn PageFetcher,
    listing: &ListingConfig,
) -> Result<u32, Box<dyn Error>> {
    let html = fetcher.fetch_html(listing.root()).await?;
    let last_page = max_page_index(&html, listing);
    info!(last_page, "Detected last listing page");
    Ok(last_page)
}

/// Collect up to `target` article URLs, oldest first.
///
/// Pages are visited from `last_page` down to 1. Each page's links are
/// reversed before being appended, so the result is ordered oldest to newest
/// across the whole traversal. URLs already collected from a later page are
/// skipped. A page that fails to load or has no article links is skipped.
/// Consecutive page fetches are `delay` apart.
#[instrument(level = "info", skip(fetcher, listing))]
pub async fn collect_oldest(
    fetcher: &dyn PageFetcher,
    listing: &ListingConfig,
    last_page: u32,
    target: usize,
    delay: Duration,
) -> Vec<String> {
    let mut collected: Vec<String> = Vec::with_capacity(target);
    let mut seen: HashSet<String> = HashSet::new();
    let mut page = last_page.max(1);

    while collected.len() < target && page >= 1 {
        if page < last_page.max(1) && !delay.is_zero() {
            sleep(delay).await;
        }
        let page_url = listing.page_url(page);
        debug!(page, %page_url, "Fetching listing page");

        match fetcher.fetch_html(&page_url).await {
            Ok(html) => {
                let links = article_links(&html, &page_url, listing);
                if links.is_empty() {
                    info!(page, "Listing page has no article links; skipping");
                }
                for url in links.into_iter().rev() {
                    if collected.len() >= target {
                        break;
                    }
                    if seen.insert(url.clone()) {
                        collected.push(url);
                    }
                }
            }
            Err(e) => {
                warn!(page, %page_url, error = %e, "Listing page fetch failed; skipping");
            }
        }
        page -= 1;
    }

    info!(count = collected.len(), target, "Collected oldest article URLs");
    debug!(urls = ?collected, "Oldest article URLs");
    collected
}

/// Discover the listing's last page and collect the oldest article URLs,
/// pausing `delay` between listing fetches.
///
/// # Errors
///
/// Only a failure to load the listing root is an error.
#[instrument(level = "info", skip_all)]
pub async fn index_articles(
    fetcher: &dyn PageFetcher,
    listing: &ListingConfig,
    delay: Duration,
) -> Result<Vec<String>, Box<dyn Error>> {
    let last_page = discover_last_page(fetcher, listing).await?;
    if !delay.is_zero() {
        sleep(delay).await;
    }
    Ok(collect_oldest(fetcher, listing, last_page, listing.target_count, delay).await)
}

/// Fetch and extract every URL, in order, pausing `delay` between fetches.
///
/// The stream is lazy: each article is fetched only when the consumer asks
/// for the next item, so per-article work can run between fetches. Failed
/// fetches and pages without body text are logged and skipped.
pub fn fetch_articles<'a>(
    fetcher: &'a dyn PageFetcher,
    urls: Vec<String>,
    delay: Duration,
) -> impl Stream<Item = BlogArticle> + 'a {
    stream::iter(urls.into_iter().enumerate())
        .then(move |(i, url)| {
            async move {
                if i > 0 && !delay.is_zero() {
                    sleep(delay).await;
                }
                let profile = ExtractionProfile::ingest();
                match fetch_article(fetcher, &url, &profile).await {
                    Ok(Some(article)) => {
                        debug!(%url, title = %article.content.title, "Fetched article");
                        Some(article)
                    }
                    Ok(None) => {
                        warn!(%url, "Article produced no content");
                        None
                    }
                    Err(e) => {
                        error!(error = %e, %url, "Article fetch failed");
                        None
                    }
                }
            }
        })
        .filter_map(std::future::ready)
}

async fn fetch_article(
    fetcher: &dyn PageFetcher,
    url: &str,
    profile: &ExtractionProfile,
) -> Result<Option<BlogArticle>, Box<dyn Error>> {
    let html = fetcher.fetch_html(url).await?;
    let content = extract(&html, url, profile);
    if content.body.is_empty() {
        return Ok(None);
    }
    Ok(Some(BlogArticle {
        url: url.to_string(),
        content,
    }))
}
