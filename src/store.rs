//! Record store access.
//!
//! The record store is an external REST service owning article records
//! (`POST /articles`, `GET /articles`, `GET /articles/{id}`). The pipeline only
//! talks to it through [`ArticleStore`]; [`MemoryArticleStore`] stands in for
//! it on `--dry-run` and in tests.

use crate::models::{Article, NewArticle};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::Client;
use std::cell::RefCell;
use std::error::Error;
use tracing::{debug, info, instrument};
use uuid::Uuid;

#[async_trait(?Send)]
pub trait ArticleStore {
    /// Persist `article` and return the stored record with id and timestamps.
    async fn create_article(&self, article: &NewArticle) -> Result<Article, Box<dyn Error>>;
    /// Every article, newest first.
    async fn list_articles(&self) -> Result<Vec<Article>, Box<dyn Error>>;
    async fn get_article(&self, id: &str) -> Result<Article, Box<dyn Error>>;
}

/// [`ArticleStore`] over the record store's REST API.
#[derive(Debug, Clone)]
pub struct HttpArticleStore {
    client: Client,
    base_url: String,
}

impl HttpArticleStore {
    /// `base_url` is the API root, e.g. `http://localhost:3000/api`.
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn articles_url(&self) -> String {
        format!("{}/articles", self.base_url)
    }
}

#[async_trait(?Send)]
impl ArticleStore for HttpArticleStore {
    #[instrument(level = "info", skip_all, fields(title = %article.title))]
    async fn create_article(&self, article: &NewArticle) -> Result<Article, Box<dyn Error>> {
        let created: Article = self
            .client
            .post(self.articles_url())
            .json(article)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        info!(id = %created.id, "Article stored");
        Ok(created)
    }

    #[instrument(level = "info", skip_all)]
    async fn list_articles(&self) -> Result<Vec<Article>, Box<dyn Error>> {
        let articles: Vec<Article> = self
            .client
            .get(self.articles_url())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!(count = articles.len(), "Listed articles");
        Ok(articles)
    }

    #[instrument(level = "debug", skip(self))]
    async fn get_article(&self, id: &str) -> Result<Article, Box<dyn Error>> {
        let url = format!("{}/{}", self.articles_url(), urlencoding::encode(id));
        let article: Article = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(article)
    }
}

/// Process-local [`ArticleStore`]. Ids are random UUIDs and creation times
/// strictly increase in insertion order.
#[derive(Debug, Default)]
pub struct MemoryArticleStore {
    articles: RefCell<Vec<Article>>,
}

impl MemoryArticleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing records.
    #[cfg(test)]
    pub fn with_articles(articles: Vec<Article>) -> Self {
        Self {
            articles: RefCell::new(articles),
        }
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> Vec<Article> {
        self.articles.borrow().clone()
    }
}

#[async_trait(?Send)]
impl ArticleStore for MemoryArticleStore {
    async fn create_article(&self, article: &NewArticle) -> Result<Article, Box<dyn Error>> {
        let mut articles = self.articles.borrow_mut();
        let mut now = Utc::now();
        if let Some(latest) = articles.iter().map(|a| a.created_at).max() {
            if now <= latest {
                now = latest + Duration::milliseconds(1);
            }
        }
        let stored = Article {
            id: Uuid::new_v4().to_string(),
            title: article.title.clone(),
            content: article.content.clone(),
            source_url: article.source_url.clone(),
            source_type: article.source_type.clone(),
            is_generated: article.is_generated,
            parent_article_id: article.parent_article_id.clone(),
            references: article.references.clone(),
            created_at: now,
            updated_at: now,
        };
        articles.push(stored.clone());
        debug!(id = %stored.id, "Article stored in memory");
        Ok(stored)
    }

    async fn list_articles(&self) -> Result<Vec<Article>, Box<dyn Error>> {
        let mut articles = self.articles.borrow().clone();
        articles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(articles)
    }

    async fn get_article(&self, id: &str) -> Result<Article, Box<dyn Error>> {
        self.articles
            .borrow()
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(|| format!("Article not found: {}", id).into())
    }
}

/// Whether `e` means the record store could not be reached at all, as
/// opposed to rejecting a single request.
pub fn is_unreachable(e: &(dyn Error + 'static)) -> bool {
    e.downcast_ref::<reqwest::Error>()
        .is_some_and(|e| e.is_connect() || e.is_timeout())
}

/// The most recently created original (non-generated) article, if any.
pub fn latest_unprocessed(articles: &[Article]) -> Option<&Article> {
    articles
        .iter()
        .filter(|a| !a.is_generated)
        .max_by_key(|a| a.created_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExtractedContent, Reference, RewriteOutput};
    use chrono::TimeZone;

    fn extracted(title: &str) -> ExtractedContent {
        ExtractedContent {
            title: title.to_string(),
            body: format!("{} body", title),
        }
    }

    fn article(id: &str, generated: bool, day: u32) -> Article {
        let at = Utc.with_ymd_and_hms(2025, 5, day, 12, 0, 0).unwrap();
        Article {
            id: id.to_string(),
            title: id.to_string(),
            content: "c".to_string(),
            source_url: None,
            source_type: None,
            is_generated: generated,
            parent_article_id: None,
            references: Vec::new(),
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_latest_unprocessed_skips_generated() {
        let articles = vec![
            article("old-original", false, 1),
            article("newest-generated", true, 9),
            article("new-original", false, 5),
        ];
        assert_eq!(latest_unprocessed(&articles).unwrap().id, "new-original");
        assert!(latest_unprocessed(&[article("g", true, 1)]).is_none());
        assert!(latest_unprocessed(&[]).is_none());
    }

    #[tokio::test]
    async fn test_memory_store_assigns_ids_and_orders_newest_first() {
        let store = MemoryArticleStore::new();
        let first = store
            .create_article(&NewArticle::ingested(extracted("First"), "https://a.test/1"))
            .await
            .unwrap();
        let second = store
            .create_article(&NewArticle::ingested(extracted("Second"), "https://a.test/2"))
            .await
            .unwrap();
        assert_ne!(first.id, second.id);
        assert!(second.created_at > first.created_at);

        let listed = store.list_articles().await.unwrap();
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
        assert_eq!(latest_unprocessed(&listed).unwrap().id, second.id);
    }

    #[tokio::test]
    async fn test_memory_store_get_article() {
        let store = MemoryArticleStore::new();
        let output = RewriteOutput {
            title: "T".to_string(),
            content: "C".to_string(),
            original_article_id: "parent".to_string(),
            references: vec![Reference {
                title: "R".to_string(),
                url: "https://r.test".to_string(),
            }],
            is_generated: true,
            source_type: "llm_generated".to_string(),
        };
        let created = store.create_article(&NewArticle::generated(output)).await.unwrap();
        let fetched = store.get_article(&created.id).await.unwrap();
        assert_eq!(fetched.parent_article_id.as_deref(), Some("parent"));
        assert!(fetched.is_generated);
        assert!(store.get_article("missing").await.is_err());
    }

    #[test]
    fn test_not_found_is_not_unreachable() {
        let e: Box<dyn Error> = "Article not found: x".into();
        assert!(!is_unreachable(e.as_ref()));
    }

    #[test]
    fn test_http_store_urls() {
        let store = HttpArticleStore::new(Client::new(), "http://localhost:3000/api/");
        assert_eq!(store.articles_url(), "http://localhost:3000/api/articles");
    }
}
