//! Data models for stored articles and the ephemeral values that flow
//! through the pipeline.
//!
//! - [`Article`]: A record as returned by the record store
//! - [`NewArticle`]: The create payload for the record store
//! - [`Reference`]: A `{title, url}` citation attached to generated articles
//! - [`SearchCandidate`]: A competitor result from the search provider chain
//! - [`ExtractedContent`]: `{title, body}` pulled out of raw HTML
//!
//! Field names follow the record store's snake_case JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Provenance tag for articles created by the ingest job.
pub const SOURCE_INGESTED: &str = "ingested";
/// Provenance tag for articles produced by the rewrite engine.
pub const SOURCE_LLM_GENERATED: &str = "llm_generated";

/// A citation to a competitor article used as rewrite input.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Reference {
    pub title: String,
    pub url: String,
}

/// An article record owned by the record store.
///
/// `id` and the timestamps are assigned by the store at creation. A generated
/// article always carries `parent_article_id`; an original never does.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub source_type: Option<String>,
    /// The store persists this as an integer column, so `0`/`1` are accepted.
    #[serde(default, deserialize_with = "bool_or_int")]
    pub is_generated: bool,
    #[serde(default)]
    pub parent_article_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub references: Vec<Reference>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The body of a create request: an [`Article`] without id and timestamps.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NewArticle {
    pub title: String,
    pub content: String,
    pub source_url: Option<String>,
    pub source_type: Option<String>,
    pub is_generated: bool,
    pub parent_article_id: Option<String>,
    pub references: Vec<Reference>,
}

impl NewArticle {
    /// An original article scraped from the listing site.
    pub fn ingested(extracted: ExtractedContent, source_url: &str) -> Self {
        Self {
            title: extracted.title,
            content: extracted.body,
            source_url: Some(source_url.to_string()),
            source_type: Some(SOURCE_INGESTED.to_string()),
            is_generated: false,
            parent_article_id: None,
            references: Vec::new(),
        }
    }

    /// A derived article linked to the original it was rewritten from.
    pub fn generated(output: RewriteOutput) -> Self {
        Self {
            title: output.title,
            content: output.content,
            source_url: None,
            source_type: Some(output.source_type),
            is_generated: true,
            parent_article_id: Some(output.original_article_id),
            references: output.references,
        }
    }
}

/// A competitor article candidate produced by the search provider chain.
///
/// `content` is only present for the static fallback set, which ships with its
/// text already populated and therefore skips scraping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCandidate {
    pub title: String,
    pub url: String,
    pub snippet: Option<String>,
    pub content: Option<String>,
}

impl SearchCandidate {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: None,
            content: None,
        }
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        let snippet = snippet.into();
        self.snippet = (!snippet.is_empty()).then_some(snippet);
        self
    }
}

/// Title and plain-text body pulled out of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedContent {
    pub title: String,
    pub body: String,
}

/// A scraped competitor article: extracted text plus the URL it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompetitorArticle {
    pub title: String,
    pub body: String,
    pub url: String,
}

impl CompetitorArticle {
    pub fn reference(&self) -> Reference {
        Reference {
            title: self.title.clone(),
            url: self.url.clone(),
        }
    }
}

/// Output contract of the rewrite engine, identical for the model-backed and
/// the deterministic path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RewriteOutput {
    pub title: String,
    pub content: String,
    pub original_article_id: String,
    pub references: Vec<Reference>,
    pub is_generated: bool,
    pub source_type: String,
}

fn bool_or_int<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrInt {
        Bool(bool),
        Int(i64),
        Null(()),
    }

    Ok(match BoolOrInt::deserialize(deserializer)? {
        BoolOrInt::Bool(b) => b,
        BoolOrInt::Int(i) => i != 0,
        BoolOrInt::Null(()) => false,
    })
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
