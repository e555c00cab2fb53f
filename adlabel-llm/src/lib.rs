//! Remote classification provider integration.
//!
//! This crate exposes the [`traits::ChatProvider`] seam, a concrete
//! OpenAI-compatible implementation and a strict reader for completion
//! bodies ([`completion::Completion`]). [`connect`] turns a
//! [`ProviderConfig`] into a shareable client.
//!
//! # Examples
//! ```no_run
//! use adlabel_llm::{connect, ProviderConfig};
//! use std::time::Duration;
//!
//! let cfg = ProviderConfig::OpenAi {
//!     api_key: "gsk_...".into(),
//!     model: adlabel_llm::DEFAULT_MODEL.into(),
//!     endpoint: Some("https://api.groq.com/openai/v1".into()),
//!     timeout: Duration::from_secs(30),
//!     transport_retries: 0,
//! };
//! let client = connect(&cfg)?;
//! assert_eq!(client.model_name(), "llama-3.1-8b-instant");
//! # Ok::<(), adlabel_common::LabelerError>(())
//! ```
pub mod completion;
pub mod openai;
pub mod traits;

use adlabel_common::{LabelerError, Result};
use openai::OpenAiChatClient;
use std::sync::Arc;
use std::time::Duration;
use traits::ChatProvider;

pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";

/// Which provider to talk to and how.
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    OpenAi {
        api_key: String,
        model: String,
        endpoint: Option<String>,
        timeout: Duration,
        transport_retries: usize,
    },
}

/// Build a provider client from configuration.
pub fn connect(config: &ProviderConfig) -> Result<Arc<dyn ChatProvider>> {
    match config {
        ProviderConfig::OpenAi {
            api_key,
            model,
            endpoint,
            timeout,
            transport_retries,
        } => {
            if api_key.trim().is_empty() {
                return Err(LabelerError::Config(
                    "provider api_key is empty".to_string(),
                ));
            }
            let client = OpenAiChatClient::new(api_key.clone(), model.clone(), endpoint.as_deref())?
                .with_timeout(*timeout)
                .with_transport_retries(*transport_retries);
            tracing::info!(endpoint = %client.endpoint(), model = %model, "llm.provider.ready");
            Ok(Arc::new(client))
        }
    }
}
