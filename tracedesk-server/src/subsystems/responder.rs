//! Responder subsystem: produces the support reply and times it.

use std::sync::Arc;

use tracedesk_core::{prompts, Clock, GenerationClient, GenerationError, SystemClock};

/// A generated reply and how long generation took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedReply {
    pub text: String,
    pub response_time_ms: i64,
}

#[derive(Clone)]
pub struct ResponseGenerator {
    client: GenerationClient,
    clock: Arc<dyn Clock>,
}

impl ResponseGenerator {
    pub fn new(client: GenerationClient) -> Self {
        Self {
            client,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Generate a reply to `user_message`.
    ///
    /// Latency covers the whole generation call, retries included, rounded to
    /// whole milliseconds.
    pub async fn generate(&self, user_message: &str) -> Result<GeneratedReply, GenerationError> {
        let prompt = prompts::chat_prompt(user_message);

        let start = self.clock.now();
        let raw = self.client.generate(&prompt).await?;
        let end = self.clock.now();

        let elapsed = end.saturating_duration_since(start);
        let response_time_ms = (elapsed.as_secs_f64() * 1000.0).round() as i64;

        Ok(GeneratedReply {
            text: raw.trim().to_string(),
            response_time_ms,
        })
    }
}
