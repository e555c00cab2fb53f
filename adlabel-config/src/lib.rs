//! Loader for `adlabel.yaml` with environment overlays.
//!
//! Sources are merged in order: the YAML file (or inline snippets), then
//! `ADLABEL__`-prefixed environment variables (`ADLABEL__BATCH__CHECKPOINT_INTERVAL=1000`
//! sets `batch.checkpoint_interval`). After merging, every string is run
//! through `${VAR}` expansion so secrets can stay in the environment:
//!
//! ```yaml
//! provider:
//!   kind: openai
//!   model: llama-3.1-8b-instant
//!   api_key: "${GROQ_API_KEY}"
//!   endpoint: https://api.groq.com/openai/v1
//! batch:
//!   checkpoint_interval: 500
//! ```
//!
//! Only `provider` is required; `retry`, `batch` and `logging` fall back to
//! the defaults below.
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const ENV_PREFIX: &str = "ADLABEL";

#[derive(Debug, Deserialize)]
pub struct AdlabelConfig {
    pub version: Option<String>,
    pub provider: ProviderSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub batch: BatchSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProviderSettings {
    Openai {
        model: String,
        api_key: String,
        /// Base URL of an OpenAI-compatible API. OpenAI itself when unset.
        #[serde(default)]
        endpoint: Option<String>,
        #[serde(default)]
        temperature: f32,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
        /// Extra transport-level retries for 429/5xx, on top of `retry`.
        #[serde(default)]
        transport_retries: usize,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_secs: f64,
    pub multiplier: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 10.0,
            multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    pub raw_path: PathBuf,
    pub processed_path: PathBuf,
    pub output_path: PathBuf,
    pub checkpoint_path: PathBuf,
    /// Records between checkpoint writes; 0 disables checkpoints.
    pub checkpoint_interval: usize,
    /// Minimum spacing between provider calls.
    pub min_request_interval_ms: u64,
    /// Re-queue ids whose stored label is `Error` or `InvalidResponse`.
    pub retry_failed: bool,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            raw_path: PathBuf::from("data/raw/ads_with_transcripts_and_ideal_points.csv"),
            processed_path: PathBuf::from("data/processed/ads_with_transcripts.csv"),
            output_path: PathBuf::from("data/processed/ads_classified.csv"),
            checkpoint_path: PathBuf::from("data/processed/ads_classified.checkpoint.csv"),
            checkpoint_interval: 500,
            min_request_interval_ms: 100,
            retry_failed: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormatSetting {
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub dir: Option<PathBuf>,
    pub format: LogFormatSetting,
    pub stderr: bool,
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            dir: None,
            format: LogFormatSetting::Text,
            stderr: true,
            filter: "info".to_string(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

impl AdlabelConfig {
    /// Reject values that would make the pipeline misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ProviderSettings::Openai {
            model, temperature, ..
        } = &self.provider;
        if model.trim().is_empty() {
            return Err(ConfigError::Message("provider.model must not be empty".into()));
        }
        if !(0.0..=2.0).contains(temperature) {
            return Err(ConfigError::Message(format!(
                "provider.temperature must be within 0..=2, got {temperature}"
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Message("retry.max_attempts must be at least 1".into()));
        }
        if !self.retry.base_delay_secs.is_finite() || self.retry.base_delay_secs < 0.0 {
            return Err(ConfigError::Message(
                "retry.base_delay_secs must be a non-negative number".into(),
            ));
        }
        if !self.retry.multiplier.is_finite() || self.retry.multiplier < 1.0 {
            return Err(ConfigError::Message("retry.multiplier must be >= 1".into()));
        }
        Ok(())
    }
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder over the `config` crate wiring (YAML + env overrides).
pub struct AdlabelConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for AdlabelConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl AdlabelConfigLoader {
    /// Start with `ADLABEL__` environment overrides only.
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// Attach a YAML/TOML/JSON file; the format is inferred from the suffix.
    /// A missing optional file is skipped.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P, required: bool) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(required));
        self
    }

    /// Merge an inline YAML snippet (tests, CLI overrides).
    ///
    /// ```
    /// use adlabel_config::{AdlabelConfigLoader, ProviderSettings};
    ///
    /// let cfg = AdlabelConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// version: "1"
    /// provider:
    ///   kind: openai
    ///   model: llama-3.1-8b-instant
    ///   api_key: example
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.version.as_deref(), Some("1"));
    /// assert_eq!(cfg.retry.max_attempts, 3);
    /// assert_eq!(cfg.batch.checkpoint_interval, 500);
    /// assert!(matches!(cfg.provider, ProviderSettings::Openai { temperature, .. } if temperature == 0.0));
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Merge sources, expand `${VAR}` placeholders, deserialize and validate.
    ///
    /// ```
    /// use adlabel_config::{AdlabelConfigLoader, ProviderSettings};
    ///
    /// temp_env::with_var("GROQ_API_KEY", Some("injected-from-env"), || {
    ///     let config = AdlabelConfigLoader::new()
    ///         .with_yaml_str(r#"
    /// provider:
    ///   kind: openai
    ///   model: llama-3.1-8b-instant
    ///   api_key: "${GROQ_API_KEY}"
    ///   endpoint: https://api.groq.com/openai/v1
    /// "#)
    ///         .load()
    ///         .expect("valid configuration");
    ///
    ///     match &config.provider {
    ///         ProviderSettings::Openai { api_key, endpoint, timeout_secs, .. } => {
    ///             assert_eq!(api_key, "injected-from-env");
    ///             assert_eq!(endpoint.as_deref(), Some("https://api.groq.com/openai/v1"));
    ///             assert_eq!(*timeout_secs, 30);
    ///         }
    ///     }
    /// });
    /// ```
    pub fn load(self) -> Result<AdlabelConfig, ConfigError> {
        // Environment goes last so it wins over files.
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: AdlabelConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;
        typed.validate()?;
        Ok(typed)
    }
}
