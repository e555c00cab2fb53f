//! Strict reader for chat completion bodies.
//!
//! Providers hand back loosely shaped JSON. [`Completion::from_value`] pulls
//! out the first choice's message text and the usage counters, and names
//! every way the body can be malformed instead of failing generically.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Token accounting for one call. Missing counters read as 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Reads a `usage` object. Absent, null or non-object values give zeros,
    /// as do absent or non-integer counters.
    pub fn from_value(usage: Option<&Value>) -> Self {
        let count = |key: &str| {
            usage
                .and_then(|u| u.get(key))
                .and_then(Value::as_u64)
                .unwrap_or(0)
        };
        Self {
            prompt_tokens: count("prompt_tokens"),
            completion_tokens: count("completion_tokens"),
            total_tokens: count("total_tokens"),
        }
    }
}

impl std::ops::AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.prompt_tokens += rhs.prompt_tokens;
        self.completion_tokens += rhs.completion_tokens;
        self.total_tokens += rhs.total_tokens;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ResponseShapeError {
    #[error("response body is not a JSON object")]
    NotAnObject,
    #[error("response has no `choices` field")]
    MissingChoices,
    #[error("`choices` is not an array")]
    ChoicesNotArray,
    #[error("`choices` is empty")]
    EmptyChoices,
    #[error("first choice has no `message` object")]
    MissingMessage,
    #[error("message has no `content` field")]
    MissingContent,
    #[error("message `content` is not a string")]
    ContentNotText,
}

/// The parts of a chat completion the pipeline relies on.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// Text of the first choice, untrimmed.
    pub content: String,
    pub usage: TokenUsage,
}

impl Completion {
    /// ```
    /// use adlabel_llm::completion::{Completion, ResponseShapeError};
    /// use serde_json::json;
    ///
    /// let body = json!({
    ///     "choices": [{"message": {"role": "assistant", "content": " Other "}}],
    ///     "usage": {"prompt_tokens": 210, "completion_tokens": 2}
    /// });
    /// let parsed = Completion::from_value(&body).unwrap();
    /// assert_eq!(parsed.content, " Other ");
    /// assert_eq!(parsed.usage.total_tokens, 0);
    ///
    /// let err = Completion::from_value(&json!({"usage": {}})).unwrap_err();
    /// assert_eq!(err, ResponseShapeError::MissingChoices);
    /// ```
    pub fn from_value(body: &Value) -> Result<Self, ResponseShapeError> {
        let obj = body.as_object().ok_or(ResponseShapeError::NotAnObject)?;
        let choices = obj
            .get("choices")
            .ok_or(ResponseShapeError::MissingChoices)?
            .as_array()
            .ok_or(ResponseShapeError::ChoicesNotArray)?;
        let first = choices.first().ok_or(ResponseShapeError::EmptyChoices)?;
        let message = first
            .get("message")
            .filter(|m| m.is_object())
            .ok_or(ResponseShapeError::MissingMessage)?;
        let content = message
            .get("content")
            .ok_or(ResponseShapeError::MissingContent)?
            .as_str()
            .ok_or(ResponseShapeError::ContentNotText)?;

        Ok(Self {
            content: content.to_string(),
            usage: TokenUsage::from_value(obj.get("usage")),
        })
    }
}
