//! Rewrite engine: turns an original article plus competitor extracts into a
//! derived article.
//!
//! With a configured chat client the engine makes one strict-JSON request and
//! validates the reply. Anything short of a usable `{title?, content}` object
//! (request error, malformed JSON, empty content) drops to a deterministic
//! template built from the same inputs, so a rewrite never fails outright.

use crate::api::{AskAsync, ChatMessage};
use crate::models::{Article, CompetitorArticle, Reference, RewriteOutput, SOURCE_LLM_GENERATED};
use crate::utils::{looks_truncated, truncate_chars, truncate_for_log};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// Competitor text included in the prompt, per competitor.
const PROMPT_EXCERPT_CHARS: usize = 1000;
const INTRO_CHARS: usize = 300;
const INSIGHT_CHARS: usize = 400;

const SYSTEM_PROMPT: &str = "Reply with a single valid JSON object and nothing else. No markdown. No explanations.";

const CONCLUSION: &str = "This article combines key ideas from top-ranking sources to present a clearer and more comprehensive understanding of the topic.";

/// Which path produced a rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RewritePath {
    Model,
    Fallback,
}

/// The shape the model is asked to produce.
#[derive(Debug, Deserialize)]
struct ModelRewrite {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

/// Validated `{title, content}` pair from a model reply. `title` is `None`
/// when the model left it out or blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRewrite {
    pub title: Option<String>,
    pub content: String,
}

/// Produces [`RewriteOutput`]s, through the chat client when one is configured.
pub struct RewriteEngine<A> {
    client: Option<A>,
}

impl<A> RewriteEngine<A>
where
    A: AskAsync<Response = String>,
{
    pub fn new(client: Option<A>) -> Self {
        Self { client }
    }

    /// Engine that always uses the deterministic template.
    pub fn template_only() -> Self {
        Self { client: None }
    }

    /// Rewrite `original` using `competitors` as source material.
    ///
    /// Always returns an output with non-empty title and content, plus the
    /// path that produced it.
    #[instrument(level = "info", skip_all, fields(article_id = %original.id, competitors = competitors.len()))]
    pub async fn rewrite(
        &self,
        original: &Article,
        competitors: &[CompetitorArticle],
    ) -> (RewriteOutput, RewritePath) {
        let Some(client) = &self.client else {
            info!("No rewrite credential configured; using template rewrite");
            return (fallback_rewrite(original, competitors), RewritePath::Fallback);
        };

        let messages = build_messages(original, competitors);
        let raw = match client.ask(&messages).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Rewrite request failed; using template rewrite");
                return (fallback_rewrite(original, competitors), RewritePath::Fallback);
            }
        };

        match parse_rewrite(&raw) {
            Some(parsed) => {
                info!(chars = parsed.content.len(), "Model rewrite accepted");
                let title = parsed.title.unwrap_or_else(|| original.title.clone());
                (
                    output(original, competitors, title, parsed.content),
                    RewritePath::Model,
                )
            }
            None => (fallback_rewrite(original, competitors), RewritePath::Fallback),
        }
    }
}

/// System and user messages for one rewrite request.
pub fn build_messages(original: &Article, competitors: &[CompetitorArticle]) -> Vec<ChatMessage> {
    let competitor_context = competitors
        .iter()
        .enumerate()
        .map(|(i, c)| {
            format!(
                "--- Competitor Article {}: \"{}\" ---\n{}",
                i + 1,
                c.title,
                truncate_chars(&c.body, PROMPT_EXCERPT_CHARS)
            )
        })
        .join("\n\n");

    let user = format!(
        r#"You are an experienced content writer and SEO editor. Rewrite the original article so it can compete with the top-ranking articles below, keeping its subject and improving structure and coverage.

OUTPUT RULES (MANDATORY):
- Output ONLY valid JSON
- NO markdown around the JSON
- NO explanations
- NO text before or after the JSON
- Start with {{ and end with }}

JSON SCHEMA:
{{
  "title": "string",
  "content": "string"
}}

ORIGINAL ARTICLE:
Title: "{}"
Content:
{}

TOP-RANKING COMPETITOR ARTICLES:
{}
"#,
        original.title, original.content, competitor_context
    );

    vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(user)]
}

/// Parse a model reply as `{title?, content}`.
///
/// The trimmed reply must be a JSON object on its own; surrounding prose or
/// code fences are rejected. Returns `None` when the reply is unusable.
pub fn parse_rewrite(raw: &str) -> Option<ParsedRewrite> {
    let parsed: ModelRewrite = match serde_json::from_str(raw.trim()) {
        Ok(p) => p,
        Err(e) => {
            warn!(
                error = %e,
                truncated = looks_truncated(&e),
                preview = %truncate_for_log(raw, 200),
                "Rewrite reply is not valid JSON"
            );
            return None;
        }
    };

    let Some(content) = parsed.content.filter(|c| !c.trim().is_empty()) else {
        warn!("Rewrite reply has no content");
        return None;
    };
    let title = parsed
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    Some(ParsedRewrite { title, content })
}

/// Deterministic rewrite used when the model path is unavailable or fails.
pub fn fallback_rewrite(original: &Article, competitors: &[CompetitorArticle]) -> RewriteOutput {
    let mut content = format!(
        "## Introduction\n\n{}\n\n",
        truncate_chars(&original.content, INTRO_CHARS)
    );
    for competitor in competitors {
        content.push_str("## Insights from Industry Leaders\n\n");
        content.push_str(truncate_chars(&competitor.body, INSIGHT_CHARS));
        content.push_str("\n\n");
    }
    content.push_str(&format!("## Conclusion\n\n{}\n\n", CONCLUSION));
    content.push_str("## References\n\n");
    for (i, competitor) in competitors.iter().enumerate() {
        content.push_str(&format!("{}. [{}]({})\n", i + 1, competitor.title, competitor.url));
    }

    output(
        original,
        competitors,
        format!("[Updated] {}", original.title),
        content,
    )
}

fn output(
    original: &Article,
    competitors: &[CompetitorArticle],
    title: String,
    content: String,
) -> RewriteOutput {
    RewriteOutput {
        title,
        content,
        original_article_id: original.id.clone(),
        references: competitors.iter().map(CompetitorArticle::reference).collect::<Vec<Reference>>(),
        is_generated: true,
        source_type: SOURCE_LLM_GENERATED.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::RefCell;
    use std::error::Error;

    /// Chat client that returns a fixed reply (or error) and keeps the
    /// messages it was sent.
    pub struct ScriptedAsk {
        pub reply: Result<String, String>,
        pub sent: RefCell<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedAsk {
        pub fn replying(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                sent: RefCell::new(Vec::new()),
            }
        }

        pub fn failing() -> Self {
            Self {
                reply: Err("503 Service Unavailable".to_string()),
                sent: RefCell::new(Vec::new()),
            }
        }
    }

    impl AskAsync for &ScriptedAsk {
        type Response = String;

        async fn ask(&self, messages: &[ChatMessage]) -> Result<String, Box<dyn Error>> {
            self.sent.borrow_mut().push(messages.to_vec());
            self.reply.clone().map_err(|e| e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedAsk;
    use super::*;
    use chrono::Utc;

    fn original() -> Article {
        Article {
            id: "orig-1".to_string(),
            title: "Choosing a Chatbot".to_string(),
            content: "o".repeat(500),
            source_url: Some("https://beyondchats.com/blogs/choosing-a-chatbot/".to_string()),
            source_type: Some("ingested".to_string()),
            is_generated: false,
            parent_article_id: None,
            references: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn competitors() -> Vec<CompetitorArticle> {
        vec![
            CompetitorArticle {
                title: "Chatbots in 2025".to_string(),
                body: "a".repeat(1500),
                url: "https://one.test/chatbots".to_string(),
            },
            CompetitorArticle {
                title: "Support Automation".to_string(),
                body: "b".repeat(600),
                url: "https://two.test/support".to_string(),
            },
        ]
    }

    #[test]
    fn test_fallback_template() {
        let out = fallback_rewrite(&original(), &competitors());
        assert_eq!(out.title, "[Updated] Choosing a Chatbot");
        assert!(out.content.starts_with(&format!("## Introduction\n\n{}\n\n", "o".repeat(300))));
        assert_eq!(out.content.matches("## Insights from Industry Leaders").count(), 2);
        assert!(out.content.contains(&format!("{}\n\n", "a".repeat(400))));
        assert!(!out.content.contains(&"a".repeat(401)));
        assert!(out.content.contains(CONCLUSION));
        assert!(out.content.ends_with(
            "## References\n\n1. [Chatbots in 2025](https://one.test/chatbots)\n2. [Support Automation](https://two.test/support)\n"
        ));
        assert_eq!(out.original_article_id, "orig-1");
        assert!(out.is_generated);
        assert_eq!(out.source_type, "llm_generated");
        assert_eq!(out.references.len(), 2);
        assert_eq!(out.references[1].url, "https://two.test/support");
    }

    #[tokio::test]
    async fn test_unconfigured_engine_uses_template() {
        let engine = RewriteEngine::<&ScriptedAsk>::template_only();
        let (out, path) = engine.rewrite(&original(), &competitors()).await;
        assert_eq!(path, RewritePath::Fallback);
        assert!(out.title.starts_with("[Updated] "));
        assert!(!out.content.is_empty());
    }

    #[tokio::test]
    async fn test_model_reply_accepted() {
        let ask = ScriptedAsk::replying(
            "  {\"title\": \"Choosing a Chatbot in 2025\", \"content\": \"## Intro\\n\\nNew body\"}\n",
        );
        let engine = RewriteEngine::new(Some(&ask));
        let (out, path) = engine.rewrite(&original(), &competitors()).await;
        assert_eq!(path, RewritePath::Model);
        assert_eq!(out.title, "Choosing a Chatbot in 2025");
        assert_eq!(out.content, "## Intro\n\nNew body");
        assert_eq!(out.original_article_id, "orig-1");
        assert_eq!(out.references.len(), 2);
        assert_eq!(ask.sent.borrow().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_title_keeps_original() {
        let ask = ScriptedAsk::replying(r#"{"content": "Body only"}"#);
        let engine = RewriteEngine::new(Some(&ask));
        let (out, path) = engine.rewrite(&original(), &competitors()).await;
        assert_eq!(path, RewritePath::Model);
        assert_eq!(out.title, "Choosing a Chatbot");
    }

    #[tokio::test]
    async fn test_unusable_replies_fall_back() {
        for reply in [
            "Here is your article: {\"title\": \"x\", \"content\": \"y\"}",
            "```json\n{\"title\": \"x\", \"content\": \"y\"}\n```",
            r#"{"title": "x"}"#,
            r#"{"title": "x", "content": "   "}"#,
            r#"{"title": "x", "content": "cut off"#,
        ] {
            let ask = ScriptedAsk::replying(reply);
            let engine = RewriteEngine::new(Some(&ask));
            let (out, path) = engine.rewrite(&original(), &competitors()).await;
            assert_eq!(path, RewritePath::Fallback, "reply: {}", reply);
            assert_eq!(out.title, "[Updated] Choosing a Chatbot");
        }
    }

    #[tokio::test]
    async fn test_request_error_falls_back() {
        let ask = ScriptedAsk::failing();
        let engine = RewriteEngine::new(Some(&ask));
        let (out, path) = engine.rewrite(&original(), &competitors()).await;
        assert_eq!(path, RewritePath::Fallback);
        assert!(out.title.starts_with("[Updated] "));
    }

    #[test]
    fn test_prompt_embeds_original_and_excerpts() {
        let messages = build_messages(&original(), &competitors());
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        let user = &messages[1].content;
        assert!(user.contains("Title: \"Choosing a Chatbot\""));
        assert!(user.contains("--- Competitor Article 1: \"Chatbots in 2025\" ---"));
        assert!(user.contains("--- Competitor Article 2: \"Support Automation\" ---"));
        assert!(user.contains(&"a".repeat(1000)));
        assert!(!user.contains(&"a".repeat(1001)));
        assert!(user.contains("\"content\": \"string\""));
    }

    #[test]
    fn test_parse_trims_and_blanks_title() {
        let parsed = parse_rewrite("\n{\"title\": \"  \", \"content\": \"c\"}\n").unwrap();
        assert_eq!(parsed.title, None);
        assert_eq!(parsed.content, "c");
    }
}
