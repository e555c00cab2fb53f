use adlabel_common::observability::{LogConfig, LogFormat};
use adlabel_config::{AdlabelConfig, LogFormatSetting, ProviderSettings};
use adlabel_llm::ProviderConfig;
use adlabel_pipeline::{BatchConfig, RetryPolicy};
use std::time::Duration;

pub fn log_config(cfg: &AdlabelConfig) -> LogConfig {
    LogConfig {
        app_name: "adlabel",
        log_dir: cfg.logging.dir.clone(),
        emit_stderr: cfg.logging.stderr,
        format: match cfg.logging.format {
            LogFormatSetting::Text => LogFormat::Text,
            LogFormatSetting::Json => LogFormat::Json,
        },
        default_filter: cfg.logging.filter.clone(),
    }
}

/// Provider connection settings plus the sampling temperature.
pub fn provider_config(cfg: &AdlabelConfig) -> (ProviderConfig, f32) {
    match &cfg.provider {
        ProviderSettings::Openai {
            model,
            api_key,
            endpoint,
            temperature,
            timeout_secs,
            transport_retries,
        } => (
            ProviderConfig::OpenAi {
                api_key: api_key.clone(),
                model: model.clone(),
                endpoint: endpoint.clone(),
                timeout: Duration::from_secs(*timeout_secs),
                transport_retries: *transport_retries,
            },
            *temperature,
        ),
    }
}

pub fn retry_policy(cfg: &AdlabelConfig) -> RetryPolicy {
    RetryPolicy::new(
        cfg.retry.max_attempts,
        Duration::from_secs_f64(cfg.retry.base_delay_secs),
        cfg.retry.multiplier,
    )
}

/// Command-line flags only ever widen what the config file asks for.
pub fn batch_config(
    cfg: &AdlabelConfig,
    retry_failed: bool,
    limit: Option<usize>,
) -> BatchConfig {
    let batch = &cfg.batch;
    BatchConfig {
        output_path: batch.output_path.clone(),
        checkpoint_path: batch.checkpoint_path.clone(),
        checkpoint_interval: batch.checkpoint_interval,
        min_request_interval: Duration::from_millis(batch.min_request_interval_ms),
        retry_failed: batch.retry_failed || retry_failed,
        limit,
    }
}
