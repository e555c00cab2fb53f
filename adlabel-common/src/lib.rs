//! Shared types used across the adlabel crates.
//!
//! This crate holds the workspace-wide error type and the logging
//! initializer. It stays small so every other crate can depend on it
//! without pulling in the HTTP or pipeline stacks.
//!
//! # Overview
//!
//! - [`LabelerError`] and [`Result`]: shared error handling
//! - [`observability`]: centralised tracing/logging initialisation
//!
//! # Examples
//!
//! ```rust
//! use adlabel_common::{LabelerError, Result};
//!
//! fn lookup(id: &str) -> Result<()> {
//!     Err(LabelerError::Store(format!("no row for {id}")))
//! }
//!
//! let err = lookup("42").unwrap_err();
//! assert_eq!(err.to_string(), "Result store error: no row for 42");
//! assert!(!err.is_retryable());
//! ```

pub mod observability;

/// Error types used across the adlabel workspace.
#[derive(thiserror::Error, Debug)]
pub enum LabelerError {
    /// The remote classification provider failed (network, timeout, HTTP status).
    #[error("Provider error: {0}")]
    Provider(String),

    /// The provider answered, but with a body that is not a chat completion.
    #[error("Malformed provider response: {0}")]
    Response(String),

    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Reading or writing a persisted result store failed.
    #[error("Result store error: {0}")]
    Store(String),

    /// Raw ad data could not be loaded.
    #[error("Ingestion error: {0}")]
    Ingest(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl LabelerError {
    /// Whether a retry of the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LabelerError::Provider(_))
    }
}

/// Convenient alias for results that use [`LabelerError`].
pub type Result<T> = std::result::Result<T, LabelerError>;
