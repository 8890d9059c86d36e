//! Text generation for Tracedesk.
//!
//! - `GenerationBackend` is the raw `generate(model, prompt)` capability.
//! - `GeminiGenerationClient` implements it over the Gemini `generateContent` API.
//! - `GenerationClient` wraps a backend with bounded retry and is the only
//!   thing the rest of the service calls.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::GenerationConfig;
use crate::retry::{retry_with_backoff, RetryExhausted, RetryPolicy, Sleeper, TokioSleeper};

/// Environment variables checked, in order, for the Gemini API key.
pub const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "GOOGLE_API_KEY"];

const API_KEY_HEADER: &str = "x-goog-api-key";

// ============================================================================
// GenerationBackend trait
// ============================================================================

/// A single, non-retrying call to a text-generation model.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, GenerationError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("HTTP request failed: {0}")]
    Http(reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Response contained no generated text")]
    EmptyResponse,

    #[error("Missing API key (set GEMINI_API_KEY)")]
    MissingApiKey,

    #[error("Prompt must not be empty")]
    EmptyPrompt,

    #[error("LLM call failed after {attempts} attempts: {last_error}")]
    RetryExhausted { attempts: usize, last_error: String },
}

impl From<reqwest::Error> for GenerationError {
    /// Request URLs are dropped so error text is safe to log and return.
    fn from(e: reqwest::Error) -> Self {
        GenerationError::Http(e.without_url())
    }
}

/// Read the API key from the environment. Called once at startup.
pub fn api_key_from_env() -> Result<String, GenerationError> {
    API_KEY_VARS
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|key| !key.trim().is_empty())
        .ok_or(GenerationError::MissingApiKey)
}

// ============================================================================
// Gemini API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiRequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiRequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    code: u16,
    message: String,
}

impl GeminiResponse {
    /// Concatenated text of the first candidate, if it has any.
    fn into_text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        (!text.is_empty()).then_some(text)
    }
}

// ============================================================================
// GeminiGenerationClient
// ============================================================================

#[derive(Clone)]
pub struct GeminiGenerationClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl fmt::Debug for GeminiGenerationClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiGenerationClient")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl GeminiGenerationClient {
    pub fn new(api_key: String, config: &GenerationConfig) -> Result<Self, GenerationError> {
        Self::with_base_url(
            api_key,
            config.base_url.clone(),
            Duration::from_secs(config.timeout_seconds),
        )
    }

    /// Create a client against a custom base URL (for testing / proxies)
    pub fn with_base_url(
        api_key: String,
        base_url: String,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        if api_key.trim().is_empty() {
            return Err(GenerationError::MissingApiKey);
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl GenerationBackend for GeminiGenerationClient {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, GenerationError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);

        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiRequestPart { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let error_detail = serde_json::from_str::<GeminiErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error);

            let (code, message) = error_detail
                .map(|e| (e.code, e.message))
                .unwrap_or((status.as_u16(), error_body));

            tracing::error!(code = code, message = %message, "Gemini API error");

            return Err(GenerationError::Api { code, message });
        }

        let gemini_response: GeminiResponse = response.json().await?;

        gemini_response
            .into_text()
            .ok_or(GenerationError::EmptyResponse)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

// ============================================================================
// GenerationClient
// ============================================================================

/// Retrying front for a [`GenerationBackend`].
#[derive(Clone)]
pub struct GenerationClient {
    backend: Arc<dyn GenerationBackend>,
    model: String,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl GenerationClient {
    pub fn new(backend: Arc<dyn GenerationBackend>, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
            policy: RetryPolicy::default(),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn from_config(backend: Arc<dyn GenerationBackend>, config: &GenerationConfig) -> Self {
        Self::new(backend, config.model.clone()).with_policy(RetryPolicy {
            max_retries: config.max_retries,
            delay: Duration::from_millis(config.retry_delay_ms),
            backoff: config.backoff,
        })
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Generate text for `prompt`, retrying transient failures.
    ///
    /// Returns the raw model output of the first successful attempt, or
    /// `RetryExhausted` once every attempt has failed.
    pub async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        if prompt.trim().is_empty() {
            return Err(GenerationError::EmptyPrompt);
        }

        let result = retry_with_backoff(self.policy.strategy(), self.sleeper.as_ref(), |attempt| {
            tracing::debug!(
                attempt = attempt,
                backend = self.backend.name(),
                model = %self.model,
                "Calling generation backend"
            );
            self.backend.generate(&self.model, prompt)
        })
        .await;

        match result {
            Ok(text) => Ok(text),
            Err(RetryExhausted { attempts, last_error }) => {
                tracing::error!(
                    attempts = attempts,
                    error = %last_error,
                    "All generation retry attempts failed"
                );
                Err(GenerationError::RetryExhausted {
                    attempts,
                    last_error: last_error.to_string(),
                })
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
