//! Chat-completion client for the rewrite service, with optional retry.
//!
//! The service is any OpenAI-compatible `chat/completions` endpoint (Groq by
//! default) authenticated with a bearer key.
//!
//! # Architecture
//!
//! - [`AskAsync`]: Core trait defining one chat request
//! - [`ChatClient`]: HTTP implementation against the completions endpoint
//! - [`RetryAsk`]: Decorator that adds exponential backoff to any `AskAsync`
//!
//! # Retry Strategy
//!
//! - `max_retries` extra attempts (zero by default: exactly one request)
//! - Exponential backoff starting at `base_delay`
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to each delay

use rand::{rng, Rng};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// One message in a chat request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Trait for async chat-completion calls.
///
/// Implementors send a conversation and return the assistant's reply. This
/// abstraction lets the rewrite engine run against the real service, a retry
/// decorator, or a scripted fake.
pub trait AskAsync {
    /// The type of response returned by the model.
    type Response;

    /// Send `messages` and receive the reply.
    async fn ask(&self, messages: &[ChatMessage]) -> Result<Self::Response, Box<dyn Error>>;
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionResponse {
    /// `choices[0].message.content`, or an error if it is missing or blank.
    fn into_content(self) -> Result<String, Box<dyn Error>> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| "Empty response from completion service".into())
    }
}

/// [`AskAsync`] implementation over HTTP.
pub struct ChatClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl ChatClient {
    pub fn new(
        client: Client,
        endpoint: &str,
        api_key: &str,
        model: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            temperature,
            max_tokens,
        }
    }

    async fn post(&self, body: &ChatCompletionRequest<'_>) -> Result<String, Box<dyn Error>> {
        let response: ChatCompletionResponse = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        response.into_content()
    }
}

impl fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl AskAsync for ChatClient {
    type Response = String;

    #[instrument(level = "info", skip_all, fields(model = %self.model))]
    async fn ask(&self, messages: &[ChatMessage]) -> Result<Self::Response, Box<dyn Error>> {
        let t0 = Instant::now();
        let body = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        let res = self.post(&body).await;

        let dt = t0.elapsed();
        match &res {
            Ok(content) => info!(
                elapsed_ms = dt.as_millis() as u64,
                chars = content.len(),
                "Completion received"
            ),
            Err(e) => warn!(elapsed_ms = dt.as_millis() as u64, error = %e, "API call failed"),
        }
        res
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`AskAsync`] implementation.
///
/// The delay between retries follows this formula:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryAsk<T> {
    /// The underlying client to wrap.
    inner: T,
    /// Maximum number of retry attempts after the first failure.
    max_retries: usize,
    /// Initial delay between retries (doubles with each attempt).
    base_delay: StdDuration,
    /// Maximum delay cap to prevent excessive waiting.
    max_delay: StdDuration,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    /// Wrap `inner` so failed requests are retried up to `max_retries` times.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let client = ChatClient::new(http, endpoint, key, model, 0.5, 4000);
    /// let retry_client = RetryAsk::new(client, 2, Duration::from_secs(1));
    /// ```
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }

    /// Delay before retrying after the `attempt`-th failure, without jitter:
    /// `base_delay * 2^(attempt - 1)`, capped at `max_delay`.
    fn backoff(&self, attempt: usize) -> StdDuration {
        let factor = u32::try_from(attempt.saturating_sub(1))
            .ok()
            .and_then(|exp| 2u32.checked_pow(exp))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync,
{
    type Response = T::Response;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, messages: &[ChatMessage]) -> Result<Self::Response, Box<dyn Error>> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.ask(messages).await {
                Ok(resp) => {
                    return Ok(resp);
                }
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        if self.max_retries > 0 {
                            error!(
                                attempt,
                                max = self.max_retries,
                                elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                                elapsed_ms_total = total_dt.as_millis() as u64,
                                error = %e,
                                "ask() exhausted retries"
                            );
                        }
                        return Err(e);
                    }

                    let delay = self.backoff(attempt);
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + StdDuration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                        elapsed_ms_total = total_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "ask() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Flaky {
        failures: usize,
        calls: Cell<usize>,
    }

    impl AskAsync for Flaky {
        type Response = String;

        async fn ask(&self, _messages: &[ChatMessage]) -> Result<String, Box<dyn Error>> {
            let n = self.calls.get() + 1;
            self.calls.set(n);
            if n <= self.failures {
                Err("transient".into())
            } else {
                Ok(format!("ok after {}", n))
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_from_transient_failure() {
        let api = RetryAsk::new(
            Flaky { failures: 2, calls: Cell::new(0) },
            3,
            StdDuration::from_millis(10),
        );
        let res = api.ask(&[ChatMessage::user("hi")]).await.unwrap();
        assert_eq!(res, "ok after 3");
    }

    #[tokio::test]
    async fn test_zero_retries_makes_one_request() {
        let api = RetryAsk::new(
            Flaky { failures: 1, calls: Cell::new(0) },
            0,
            StdDuration::from_millis(10),
        );
        assert!(api.ask(&[ChatMessage::user("hi")]).await.is_err());
        assert_eq!(api.inner.calls.get(), 1);
    }

    #[test]
    fn test_backoff_doubles_then_caps() {
        let api = RetryAsk::new(
            Flaky { failures: 0, calls: Cell::new(0) },
            64,
            StdDuration::from_secs(1),
        );
        assert_eq!(api.backoff(1), StdDuration::from_secs(1));
        assert_eq!(api.backoff(3), StdDuration::from_secs(4));
        assert_eq!(api.backoff(6), StdDuration::from_secs(30));
        assert_eq!(api.backoff(40), StdDuration::from_secs(30));
        assert_eq!(api.backoff(usize::MAX), StdDuration::from_secs(30));
    }

    #[test]
    fn test_completion_content_extraction() {
        let json = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"{\"title\":\"T\",\"content\":\"C\"}"}}]}"#;
        let response: ChatCompletionResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.into_content().unwrap(), r#"{"title":"T","content":"C"}"#);

        let empty: ChatCompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(empty.into_content().is_err());

        let blank: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":"  "}}]}"#).unwrap();
        assert!(blank.into_content().is_err());
    }

    #[test]
    fn test_request_body_shape() {
        let messages = vec![ChatMessage::system("sys"), ChatMessage::user("usr")];
        let body = ChatCompletionRequest {
            model: "llama-3.3-70b-versatile",
            messages: &messages,
            temperature: 0.5,
            max_tokens: 4000,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "llama-3.3-70b-versatile");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "usr");
        assert_eq!(json["max_tokens"], 4000);
    }

    #[test]
    fn test_debug_redacts_key() {
        let client = ChatClient::new(Client::new(), "https://x", "sk-secret", "m", 0.5, 10);
        assert!(!format!("{:?}", client).contains("sk-secret"));
    }
}
