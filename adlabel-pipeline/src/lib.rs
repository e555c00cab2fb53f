//! Political ad labelling pipeline.
//!
//! Records come in through [`ingest`], are turned into prompts by
//! [`prompt::build_prompt`] (using [`normalize`] on free text), labelled by
//! an [`AdClassifier`] and accumulated by the [`BatchDriver`] into a
//! [`ResultStore`] that survives across runs.
//!
//! # Examples
//!
//! ```no_run
//! use adlabel_llm::{connect, ProviderConfig, DEFAULT_MODEL};
//! use adlabel_pipeline::{ingest, AdClassifier, BatchConfig, BatchDriver};
//! use std::path::Path;
//! use std::time::Duration;
//!
//! # async fn demo() -> adlabel_common::Result<()> {
//! let provider = connect(&ProviderConfig::OpenAi {
//!     api_key: std::env::var("GROQ_API_KEY").unwrap_or_default(),
//!     model: DEFAULT_MODEL.into(),
//!     endpoint: Some("https://api.groq.com/openai/v1".into()),
//!     timeout: Duration::from_secs(30),
//!     transport_retries: 0,
//! })?;
//! let records = ingest::load_records(
//!     Path::new("data/raw/ads_with_transcripts_and_ideal_points.csv"),
//!     Path::new("data/processed/ads_with_transcripts.csv"),
//! )?;
//!
//! let driver = BatchDriver::new(AdClassifier::new(provider, 0.0), BatchConfig::default());
//! let outcome = driver.run(&records).await?;
//! println!("{}", outcome.summary.label_line());
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod classifier;
pub mod evaluate;
pub mod ingest;
pub mod literal;
pub mod normalize;
pub mod prompt;
pub mod rate;
pub mod record;
pub mod retry;
pub mod store;
pub mod types;

pub use batch::{BatchConfig, BatchDriver, RunOutcome, RunSummary};
pub use classifier::AdClassifier;
pub use evaluate::{evaluate, Evaluation};
pub use prompt::build_prompt;
pub use record::{AdField, AdRecord};
pub use retry::RetryPolicy;
pub use store::ResultStore;
pub use types::{Classification, ClassificationResult, Label};
