use crate::prompt::build_prompt;
use crate::record::AdRecord;
use crate::retry::RetryPolicy;
use crate::types::{Classification, ClassificationResult, Label};
use adlabel_common::Result;
use adlabel_llm::completion::Completion;
use adlabel_llm::traits::{ChatMessage, ChatProvider, ChatRequest};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn, Instrument};

pub const SYSTEM_INSTRUCTION: &str = "You are a strict classifier of political ads. Only respond with 'Presidential', 'Other', or 'Unsure'.";

/// Room for one label and nothing else.
pub const MAX_COMPLETION_TOKENS: u32 = 5;

const RAW_SNIPPET_CHARS: usize = 500;

/// Turns prompts into labels through a [`ChatProvider`].
///
/// Every call ends in a [`Classification`]: transport failures are retried
/// per the [`RetryPolicy`] and then reported as [`Label::Error`], malformed
/// bodies become [`Label::Error`] straight away and off-list answers become
/// [`Label::InvalidResponse`].
pub struct AdClassifier {
    provider: Arc<dyn ChatProvider>,
    temperature: f32,
    retry: RetryPolicy,
}

impl AdClassifier {
    pub fn new(provider: Arc<dyn ChatProvider>, temperature: f32) -> Self {
        Self {
            provider,
            temperature,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Classify one already built prompt.
    pub async fn classify(&self, prompt: &str) -> Classification {
        let request = ChatRequest {
            model: self.provider.model_name().to_string(),
            temperature: self.temperature,
            max_completion_tokens: MAX_COMPLETION_TOKENS,
            messages: vec![
                ChatMessage::system(SYSTEM_INSTRUCTION),
                ChatMessage::user(prompt),
            ],
        };

        match self.send_with_retry(&request).await {
            Ok(body) => parse_classification(&body),
            Err(_) => Classification::error(),
        }
    }

    /// Build the prompt for `record`, classify it and tag the result with the
    /// record id.
    pub async fn analyze(&self, record: &AdRecord) -> ClassificationResult {
        let span = tracing::info_span!("analyze", ad_id = %record.id());
        async {
            let prompt = build_prompt(record);
            let classification = self.classify(&prompt).await;
            debug!(label = %classification.label, "classify.done");
            ClassificationResult::new(record.id(), classification)
        }
        .instrument(span)
        .await
    }

    async fn send_with_retry(&self, request: &ChatRequest) -> Result<Value> {
        let mut attempt = 1;
        loop {
            match self.provider.complete(request).await {
                Ok(body) => return Ok(body),
                Err(err) => {
                    let delay = err
                        .is_retryable()
                        .then(|| self.retry.delay_after(attempt))
                        .flatten();
                    let Some(delay) = delay else {
                        warn!(attempt, error = %err, "classify.request_failed");
                        return Err(err);
                    };
                    warn!(
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        delay_secs = delay.as_secs_f64(),
                        error = %err,
                        "classify.retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

fn parse_classification(body: &Value) -> Classification {
    match Completion::from_value(body) {
        Ok(completion) => Classification {
            label: Label::from_response(&completion.content),
            usage: completion.usage,
        },
        Err(err) => {
            warn!(
                error = %err,
                raw = %snippet(&body.to_string()),
                "classify.malformed_response"
            );
            Classification::error()
        }
    }
}

fn snippet(raw: &str) -> String {
    match raw.char_indices().nth(RAW_SNIPPET_CHARS) {
        Some((cut, _)) => format!("{}…", &raw[..cut]),
        None => raw.to_string(),
    }
}
