//! Classifier subsystem: files a finished exchange under one category.
//!
//! The model is asked for a single label. Its answer is normalized and
//! checked against the fixed category set; anything unrecognized is filed
//! under the fallback category with a warning.

use tracedesk_core::{prompts, Category, GenerationClient, GenerationError};

/// Result of validating a normalized label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelOutcome {
    Recognized(Category),
    /// The label matched no category; `raw` is the normalized text.
    Fallback { raw: String },
}

impl LabelOutcome {
    pub fn category(&self) -> Category {
        match self {
            LabelOutcome::Recognized(category) => *category,
            LabelOutcome::Fallback { .. } => Category::FALLBACK,
        }
    }
}

/// Trim, drop every period, keep the first line, trim again.
pub fn normalize_label(raw: &str) -> String {
    raw.trim()
        .replace('.', "")
        .split('\n')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Normalize a raw model answer and match it against the category set.
pub fn resolve_label(raw: &str) -> LabelOutcome {
    let label = normalize_label(raw);
    match label.parse::<Category>() {
        Ok(category) => LabelOutcome::Recognized(category),
        Err(_) => LabelOutcome::Fallback { raw: label },
    }
}

#[derive(Clone)]
pub struct Classifier {
    client: GenerationClient,
}

impl Classifier {
    pub fn new(client: GenerationClient) -> Self {
        Self { client }
    }

    pub async fn classify(
        &self,
        user_message: &str,
        bot_response: &str,
    ) -> Result<Category, GenerationError> {
        let prompt = prompts::classification_prompt(user_message, bot_response);
        let raw = self.client.generate(&prompt).await?;

        let outcome = resolve_label(&raw);
        if let LabelOutcome::Fallback { raw: label } = &outcome {
            tracing::warn!(
                label = %label,
                fallback = %Category::FALLBACK,
                "Invalid category returned by classifier model"
            );
        }

        Ok(outcome.category())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystems::testing::{capture_logs, client_for, FixedBackend};
    use std::sync::Arc;

    fn classifier(reply: &str) -> (Classifier, Arc<FixedBackend>) {
        let backend = Arc::new(FixedBackend::replying(reply));
        (Classifier::new(client_for(backend.clone())), backend)
    }

    #[test]
    fn test_normalize_strips_period_and_newline() {
        assert_eq!(normalize_label("Refund.\n"), "Refund");
        assert_eq!(normalize_label("  Account Access.  "), "Account Access");
        assert_eq!(normalize_label("Billing\nBecause the user mentions a charge."), "Billing");
        assert_eq!(normalize_label("\n\n"), "");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "Refund.\n",
            " General Inquiry ",
            "Cancellation.\r\nextra",
            "...",
            "Unknown Category",
            "",
            "a.b.c\nd",
        ];
        for sample in samples {
            let once = normalize_label(sample);
            assert_eq!(normalize_label(&once), once, "not idempotent for {sample:?}");
        }
    }

    #[test]
    fn test_resolve_label_falls_back_on_unknown() {
        assert_eq!(
            resolve_label("Unknown Category"),
            LabelOutcome::Fallback {
                raw: "Unknown Category".to_string()
            }
        );
        assert_eq!(resolve_label("billing").category(), Category::GeneralInquiry);
        assert_eq!(resolve_label("").category(), Category::GeneralInquiry);
        assert_eq!(
            resolve_label("Cancellation."),
            LabelOutcome::Recognized(Category::Cancellation)
        );
    }

    #[test]
    fn test_resolve_label_always_yields_a_known_category() {
        let noisy = [
            "Billing",
            "Refund.\n",
            "The category is Billing",
            "REFUND",
            "Account\nAccess",
            "🙂",
            "General Inquiry.",
            "   ",
        ];
        for raw in noisy {
            assert!(Category::ALL.contains(&resolve_label(raw).category()));
        }
    }

    #[tokio::test]
    async fn test_charged_twice_is_billing() {
        let (classifier, backend) = classifier("Billing");
        let category = classifier
            .classify(
                "I was charged twice this month",
                "Sorry about the duplicate billing charge, I've flagged it for review.",
            )
            .await
            .unwrap();

        assert_eq!(category, Category::Billing);
        let prompt = &backend.prompts()[0];
        assert!(prompt.contains("I was charged twice this month"));
        assert!(prompt.contains("duplicate billing charge"));
    }

    #[tokio::test]
    async fn test_trailing_period_and_newline_accepted() {
        let (classifier, _) = classifier("Refund.\n");
        let category = classifier.classify("I want my money back", "Sure.").await.unwrap();
        assert_eq!(category, Category::Refund);
    }

    #[tokio::test]
    async fn test_unknown_label_falls_back_to_general_inquiry() {
        let (classifier, _) = classifier("Unknown Category");
        let category = classifier.classify("hi", "hello").await.unwrap();
        assert_eq!(category, Category::GeneralInquiry);
    }

    #[tokio::test]
    async fn test_fallback_logs_warning_with_rejected_label() {
        let (logs, _guard) = capture_logs();
        let (classifier, _) = classifier("Unknown Category");

        classifier.classify("Do you have an API?", "Yes, we do.").await.unwrap();

        let logs = logs.contents();
        let line = logs
            .lines()
            .find(|l| l.contains("Invalid category returned by classifier model"))
            .unwrap_or_else(|| panic!("no fallback warning in logs: {logs}"));
        assert!(line.contains("WARN"));
        assert!(line.contains("label=Unknown Category"));
        assert!(line.contains("fallback=General Inquiry"));
    }

    #[tokio::test]
    async fn test_recognized_label_logs_no_warning() {
        let (logs, _guard) = capture_logs();
        let (classifier, _) = classifier("Billing");

        classifier.classify("charged twice", "Sorry.").await.unwrap();

        assert!(!logs.contents().contains("Invalid category"));
    }

    #[tokio::test]
    async fn test_generation_failure_propagates_without_extra_retries() {
        let backend = Arc::new(FixedBackend::failing());
        let classifier = Classifier::new(client_for(backend.clone()));

        let result = classifier.classify("hi", "hello").await;

        assert!(matches!(result, Err(GenerationError::RetryExhausted { .. })));
        assert_eq!(backend.calls(), 3);
    }
}
