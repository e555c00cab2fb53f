use adlabel_common::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// One chat completion request, serialized in the OpenAI wire shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub temperature: f32,
    pub max_completion_tokens: u32,
    pub messages: Vec<ChatMessage>,
}

/// The single remote call primitive.
///
/// Implementations return the provider's raw JSON body on success so callers
/// can validate its shape themselves (see [`crate::completion`]). Transport,
/// timeout and HTTP status failures come back as
/// [`adlabel_common::LabelerError::Provider`].
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<serde_json::Value>;

    /// Model name requests should be sent with.
    fn model_name(&self) -> &str;
}
