use crate::traits::{ChatProvider, ChatRequest};
use adlabel_common::{LabelerError, Result};
use adlabel_http::{HttpClient, HttpError, RequestOpts};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1/";

/// Client for OpenAI-compatible `chat/completions` endpoints (OpenAI, Groq,
/// and gateways speaking the same protocol).
pub struct OpenAiChatClient {
    client: HttpClient,
    api_key: String,
    model: String,
}

impl OpenAiChatClient {
    /// Create a client for `endpoint` (defaults to the OpenAI API when `None`).
    ///
    /// Transport retries default to zero: callers own the retry policy.
    pub fn new(api_key: String, model: String, endpoint: Option<&str>) -> Result<Self> {
        let client = HttpClient::new(endpoint.unwrap_or(OPENAI_API_BASE))
            .map_err(|e| LabelerError::Config(format!("HttpClient init failed: {e}")))?
            .with_retries(0);

        Ok(Self {
            client,
            api_key,
            model,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = self.client.with_timeout(timeout);
        self
    }

    pub fn with_transport_retries(mut self, retries: usize) -> Self {
        self.client = self.client.with_retries(retries);
        self
    }

    pub fn endpoint(&self) -> &str {
        self.client.base().as_str()
    }
}

#[async_trait]
impl ChatProvider for OpenAiChatClient {
    async fn complete(&self, request: &ChatRequest) -> Result<Value> {
        tracing::debug!(
            model = %request.model,
            max_completion_tokens = request.max_completion_tokens,
            "openai.chat.complete"
        );

        let opts = RequestOpts {
            bearer: Some(&self.api_key),
            ..Default::default()
        };
        self.client
            .post_json_opts("chat/completions", request, opts)
            .await
            .map_err(http_to_labeler)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn http_to_labeler(e: HttpError) -> LabelerError {
    match e {
        HttpError::Url(_) | HttpError::Build(_) => LabelerError::Config(e.to_string()),
        HttpError::Decode(..) => LabelerError::Response(e.to_string()),
        other => LabelerError::Provider(other.to_string()),
    }
}
