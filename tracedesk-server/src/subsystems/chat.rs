//! Chat pipeline: reply, classify, persist. Strictly in that order, and
//! nothing is stored unless both model calls succeed.

use std::sync::Arc;

use thiserror::Error;
use tracedesk_core::{GenerationClient, GenerationError, NewTrace, Trace};

use crate::subsystems::classifier::Classifier;
use crate::subsystems::responder::ResponseGenerator;
use crate::subsystems::store::TraceStore;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("Storage failed: {0}")]
    Storage(#[from] sqlx::Error),
}

#[derive(Clone)]
pub struct ChatService {
    responder: ResponseGenerator,
    classifier: Classifier,
    store: Arc<dyn TraceStore>,
}

impl ChatService {
    pub fn new(
        responder: ResponseGenerator,
        classifier: Classifier,
        store: Arc<dyn TraceStore>,
    ) -> Self {
        Self {
            responder,
            classifier,
            store,
        }
    }

    /// Responder and classifier sharing one generation client.
    pub fn from_client(client: GenerationClient, store: Arc<dyn TraceStore>) -> Self {
        Self::new(
            ResponseGenerator::new(client.clone()),
            Classifier::new(client),
            store,
        )
    }

    pub fn store(&self) -> &Arc<dyn TraceStore> {
        &self.store
    }

    pub async fn handle_message(&self, user_message: &str) -> Result<Trace, ChatError> {
        let reply = self.responder.generate(user_message).await?;
        let category = self.classifier.classify(user_message, &reply.text).await?;

        let trace = self
            .store
            .create(NewTrace {
                user_message: user_message.to_string(),
                bot_response: reply.text,
                category,
                response_time_ms: reply.response_time_ms,
            })
            .await?;

        tracing::info!(
            trace_id = %trace.id,
            category = %trace.category,
            response_time_ms = trace.response_time_ms,
            "Chat exchange recorded"
        );

        Ok(trace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystems::store::MemoryTraceStore;
    use crate::subsystems::testing::{client_for, FixedBackend, SteppingClock};
    use std::time::Duration;
    use tracedesk_core::Category;

    fn service(backend: Arc<FixedBackend>, store: Arc<MemoryTraceStore>) -> ChatService {
        let client = client_for(backend);
        let responder = ResponseGenerator::new(client.clone())
            .with_clock(Arc::new(SteppingClock::new(Duration::from_millis(50))));
        ChatService::new(responder, Classifier::new(client), store)
    }

    #[tokio::test]
    async fn test_exchange_is_stored_with_reply_category_and_latency() {
        let backend = Arc::new(FixedBackend::scripted(&[
            Some("  We're sorry about the double charge.  "),
            Some("Billing"),
        ]));
        let store = Arc::new(MemoryTraceStore::new());

        let trace = service(backend.clone(), store.clone())
            .handle_message("I was charged twice this month")
            .await
            .unwrap();

        assert_eq!(trace.user_message, "I was charged twice this month");
        assert_eq!(trace.bot_response, "We're sorry about the double charge.");
        assert_eq!(trace.category, Category::Billing);
        assert_eq!(trace.response_time_ms, 50);
        assert_eq!(store.list(None).await.unwrap(), vec![trace]);

        let prompts = backend.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].contains("We're sorry about the double charge."));
    }

    #[tokio::test]
    async fn test_reply_failure_stores_nothing() {
        let backend = Arc::new(FixedBackend::failing());
        let store = Arc::new(MemoryTraceStore::new());

        let result = service(backend.clone(), store.clone()).handle_message("hello").await;

        assert!(matches!(result, Err(ChatError::Generation(_))));
        assert_eq!(backend.calls(), 3);
        assert_eq!(store.count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_classification_failure_stores_nothing() {
        let backend = Arc::new(FixedBackend::scripted(&[Some("Hello!"), None, None, None]));
        let store = Arc::new(MemoryTraceStore::new());

        let result = service(backend.clone(), store.clone()).handle_message("hello").await;

        assert!(matches!(
            result,
            Err(ChatError::Generation(GenerationError::RetryExhausted { attempts: 3, .. }))
        ));
        assert_eq!(backend.calls(), 4);
        assert_eq!(store.count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unrecognized_label_still_stores_fallback() {
        let backend = Arc::new(FixedBackend::scripted(&[
            Some("Our docs cover that."),
            Some("Feature Request"),
        ]));
        let store = Arc::new(MemoryTraceStore::new());

        let trace = service(backend, store).handle_message("Do you have an API?").await.unwrap();
        assert_eq!(trace.category, Category::GeneralInquiry);
    }
}
