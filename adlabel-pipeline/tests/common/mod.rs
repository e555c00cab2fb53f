#![allow(dead_code)]

use adlabel_common::{LabelerError, Result};
use adlabel_llm::traits::{ChatProvider, ChatRequest};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Mutex;

pub fn completion(label: &str, prompt: u64, completion: u64, total: u64) -> Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": label}, "finish_reason": "stop"}],
        "usage": {"prompt_tokens": prompt, "completion_tokens": completion, "total_tokens": total}
    })
}

pub fn provider_down() -> LabelerError {
    LabelerError::Provider("503 Service Unavailable".into())
}

/// Replays queued replies in order, then answers `fallback` forever.
/// A user prompt containing `PANIC` makes the call panic.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<Value>>>,
    fallback: Value,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn answering(fallback: Value) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn then(self, reply: Result<Value>) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn user_prompts(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .map(|r| r.messages.last().map(|m| m.content.clone()).unwrap_or_default())
            .collect()
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    async fn complete(&self, request: &ChatRequest) -> Result<Value> {
        self.requests.lock().unwrap().push(request.clone());
        if request.messages.iter().any(|m| m.content.contains("PANIC")) {
            panic!("provider blew up");
        }
        let next = self.replies.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(self.fallback.clone()))
    }

    fn model_name(&self) -> &str {
        "llama-3.1-8b-instant"
    }
}
