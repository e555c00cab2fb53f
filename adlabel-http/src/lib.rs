//! JSON-over-HTTP client with safe logging and bounded transport retries.
//!
//! - Request options: headers, bearer auth, timeout, retries
//! - Never logs secret values; `Authorization` is always redacted
//! - Retries network failures, 429 and 5xx with exponential backoff and
//!   `Retry-After` support
//! - Optional *raw* request/response logging via `ADLABEL_HTTP_RAW=1`
//!
//! Example (no_run):
//! ```rust
//! # async fn demo() -> Result<(), adlabel_http::HttpError> {
//! let client = adlabel_http::HttpClient::new("https://api.example.com/v1/")?;
//! let got: serde_json::Value = client
//!     .post_json("chat/completions", Some("sk-demo"), &serde_json::json!({"ping": true}))
//!     .await?;
//! # Ok(()) }
//! ```
//!
//! Observability: structured `tracing` events are emitted for request start,
//! response headers, truncated body snippets, retries and final errors. Raw
//! lines (target `http.raw`) are only emitted when `ADLABEL_HTTP_RAW=1`.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;
use uuid::Uuid;

const RAW_ENV: &str = "ADLABEL_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024;
const SNIPPET_MAX: usize = 500;
const BACKOFF_BASE_MS: u64 = 200;

fn raw_enabled() -> bool {
    matches!(
        env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

fn redact_headers(h: &HeaderMap) -> Vec<(String, String)> {
    h.iter()
        .map(|(k, v)| {
            let key = k.as_str().to_string();
            let val = if key.eq_ignore_ascii_case(AUTHORIZATION.as_str()) {
                "Bearer <redacted>".to_string()
            } else {
                v.to_str().unwrap_or("").to_string()
            };
            (key, val)
        })
        .collect()
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("decode error: {0}, body_snippet: {1}")]
    Decode(String, String),
    #[error("server returned error {status}: {message}, request_id={request_id}")]
    Api {
        status: StatusCode,
        message: String,
        request_id: String,
    },
}

impl HttpError {
    /// Failures worth another attempt: connection trouble, throttling and
    /// server-side errors.
    pub fn is_transient(&self) -> bool {
        match self {
            HttpError::Network(_) => true,
            HttpError::Api { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            _ => false,
        }
    }
}

/// Per-request tuning knobs for the HTTP client.
///
/// ```
/// use adlabel_http::RequestOpts;
/// use std::time::Duration;
///
/// let opts = RequestOpts {
///     timeout: Some(Duration::from_secs(30)),
///     retries: Some(0),
///     bearer: Some("token"),
///     ..Default::default()
/// };
///
/// assert_eq!(opts.timeout.unwrap().as_secs(), 30);
/// assert!(opts.headers.is_none());
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestOpts<'a> {
    pub timeout: Option<Duration>,
    pub retries: Option<usize>,
    pub bearer: Option<&'a str>,
    pub headers: Option<HeaderMap>,
}

#[derive(Clone)]
pub struct HttpClient {
    base: Url,
    inner: Client,
    pub default_timeout: Duration,
    pub max_retries: usize,
}

impl HttpClient {
    /// Construct a client anchored to a base URL. A trailing `/` is added
    /// when missing so relative paths resolve underneath it.
    ///
    /// ```no_run
    /// use adlabel_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new("https://api.groq.com/openai/v1")?;
    /// assert_eq!(client.default_timeout, Duration::from_secs(30));
    /// assert_eq!(client.max_retries, 2);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new(base: &str) -> Result<Self, HttpError> {
        let normalized = if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{base}/")
        };
        let base = Url::parse(&normalized).map_err(|e| HttpError::Url(e.to_string()))?;
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            base,
            inner,
            default_timeout: Duration::from_secs(30),
            max_retries: 2,
        })
    }

    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    /// Override the transport-level retry budget. `0` sends each request once.
    pub fn with_retries(mut self, n: usize) -> Self {
        self.max_retries = n;
        self
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// POST JSON using optional bearer auth and the client defaults.
    pub async fn post_json<B, T>(
        &self,
        path: &str,
        bearer: Option<&str>,
        body: &B,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let opts = RequestOpts {
            bearer,
            ..Default::default()
        };
        self.request_json(Method::POST, path, Some(body), opts)
            .await
    }

    /// POST JSON with per-request options.
    pub async fn post_json_opts<B, T>(
        &self,
        path: &str,
        body: &B,
        opts: RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request_json(Method::POST, path, Some(body), opts)
            .await
    }

    async fn request_json<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        opts: RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self
            .base
            .join(path)
            .map_err(|e| HttpError::Url(e.to_string()))?;
        let body_bytes = match body {
            Some(b) => {
                Some(serde_json::to_vec(b).map_err(|e| HttpError::Build(e.to_string()))?)
            }
            None => None,
        };
        let bearer = match opts.bearer {
            Some(raw) => Some(sanitize_api_key(raw)?),
            None => None,
        };
        let timeout = opts.timeout.unwrap_or(self.default_timeout);
        let max_retries = opts.retries.unwrap_or(self.max_retries);
        let req_id = Uuid::new_v4().simple().to_string();

        let mut attempt = 0usize;
        loop {
            let mut rb = self
                .inner
                .request(method.clone(), url.clone())
                .timeout(timeout);
            if let Some(bytes) = &body_bytes {
                rb = rb.header(CONTENT_TYPE, "application/json").body(bytes.clone());
            }
            if let Some(hdrs) = &opts.headers {
                rb = rb.headers(hdrs.clone());
            }
            if let Some(tok) = &bearer {
                rb = rb.bearer_auth(tok);
            }

            tracing::debug!(
                req_id=%req_id,
                attempt=attempt + 1,
                max_retries,
                method=%method,
                host_path=%format!("{}{}", url.host_str().unwrap_or("-"), url.path()),
                timeout_ms=timeout.as_millis() as u64,
                auth_kind=if bearer.is_some() { "bearer" } else { "none" },
                has_body=%body_bytes.is_some(),
                "http.request.start"
            );

            if raw_enabled() {
                let hdrs = opts.headers.as_ref().map(redact_headers).unwrap_or_default();
                let body_text = body_bytes
                    .as_deref()
                    .map(|b| snip(b, RAW_MAX_BODY))
                    .unwrap_or_default();
                tracing::debug!(target: "http.raw", %req_id, %method, url=%url, headers=?hdrs, body=%body_text, "request");
            }

            let t0 = Instant::now();
            let outcome = match rb.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    let headers = resp.headers().clone();
                    resp.bytes().await.map(|b| (status, headers, b))
                }
                Err(err) => Err(err),
            };
            let (status, headers, bytes) = match outcome {
                Ok(parts) => parts,
                Err(err) => {
                    let message = err.to_string();
                    if attempt < max_retries {
                        attempt += 1;
                        let delay = backoff(attempt);
                        tracing::warn!(
                            req_id=%req_id,
                            attempt,
                            max_retries,
                            backoff_ms=delay.as_millis() as u64,
                            message=%message,
                            "http.retrying.network"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    tracing::warn!(req_id=%req_id, attempt, message=%message, "http.network_error");
                    return Err(HttpError::Network(message));
                }
            };
            let dur_ms = t0.elapsed().as_millis() as u64;

            let x_request_id = headers
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-")
                .to_string();
            let remaining = headers
                .get("x-ratelimit-remaining-requests")
                .and_then(|v| v.to_str().ok());

            tracing::debug!(
                req_id=%req_id,
                %status,
                duration_ms=dur_ms,
                body_len=bytes.len(),
                x_request_id=%x_request_id,
                rate_limit.remaining=?remaining,
                "http.response.headers"
            );

            if raw_enabled() {
                tracing::info!(
                    target: "http.raw",
                    %req_id,
                    %status,
                    duration_ms=dur_ms,
                    headers=?redact_headers(&headers),
                    body=%snip(&bytes, RAW_MAX_BODY),
                    "response"
                );
            }

            let snippet = snip(&bytes, SNIPPET_MAX);
            if status.is_success() {
                return serde_json::from_slice::<T>(&bytes).map_err(|e| {
                    tracing::warn!(
                        req_id=%req_id,
                        serde_err=%e,
                        body_snippet=%snippet,
                        "http.response.decode_error"
                    );
                    HttpError::Decode(e.to_string(), snippet)
                });
            }

            let message = extract_error_message(&bytes);
            let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            if retryable && attempt < max_retries {
                attempt += 1;
                let delay = retry_after(&headers).unwrap_or_else(|| backoff(attempt));
                tracing::warn!(
                    req_id=%req_id,
                    %status,
                    attempt,
                    max_retries,
                    backoff_ms=delay.as_millis() as u64,
                    message=%message,
                    "http.retrying"
                );
                sleep(delay).await;
                continue;
            }

            tracing::warn!(
                req_id=%req_id,
                %status,
                message=%message,
                x_request_id=%x_request_id,
                body_snippet=%snippet,
                "http.error"
            );
            return Err(HttpError::Api {
                status,
                message,
                request_id: x_request_id,
            });
        }
    }
}

fn backoff(attempt: usize) -> Duration {
    let shift = attempt.saturating_sub(1).min(16) as u32;
    Duration::from_millis(BACKOFF_BASE_MS.saturating_mul(1u64 << shift))
}

fn extract_error_message(body: &[u8]) -> String {
    // {"error":{"message":"..."}}
    #[derive(Deserialize)]
    struct OpenAiEnv {
        error: OpenAiDetail,
    }
    #[derive(Deserialize)]
    struct OpenAiDetail {
        message: String,
    }

    // {"message":"..."} or {"detail":"..."} or {"error":"..."}
    #[derive(Deserialize)]
    struct Msg {
        #[serde(default)]
        message: String,
        #[serde(default)]
        detail: String,
        #[serde(default)]
        error: String,
    }

    if let Ok(env) = serde_json::from_slice::<OpenAiEnv>(body) {
        return env.error.message;
    }
    if let Ok(m) = serde_json::from_slice::<Msg>(body) {
        for candidate in [m.message, m.detail, m.error] {
            if !candidate.is_empty() {
                return candidate;
            }
        }
    }
    snip(body, SNIPPET_MAX)
}

fn retry_after(h: &HeaderMap) -> Option<Duration> {
    h.get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn snip(body: &[u8], max: usize) -> String {
    let text = String::from_utf8_lossy(body);
    if text.len() <= max {
        return text.into_owned();
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &text[..cut])
}

fn sanitize_api_key(raw: &str) -> Result<String, HttpError> {
    let mut s = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string();
    s.retain(|ch| !ch.is_ascii_whitespace());

    if s.is_empty() {
        return Err(HttpError::Build("API key is empty".into()));
    }
    if !s.is_ascii() {
        return Err(HttpError::Build("API key contains non-ASCII bytes".into()));
    }
    if s.bytes().any(|b| b < 0x20 || b == 0x7F) {
        return Err(HttpError::Build(
            "API key contains control characters".into(),
        ));
    }

    HeaderValue::from_str(&format!("Bearer {s}"))
        .map_err(|e| HttpError::Build(format!("invalid Authorization header: {e}")))?;
    Ok(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_quotes_and_whitespace() {
        assert_eq!(sanitize_api_key(" 'gsk_ab\ncd' ").unwrap(), "gsk_abcd");
        assert!(sanitize_api_key("   ").is_err());
        assert!(sanitize_api_key("clé").is_err());
    }

    #[test]
    fn error_message_prefers_provider_envelope() {
        let body = br#"{"error":{"message":"model not found","type":"invalid_request_error"}}"#;
        assert_eq!(extract_error_message(body), "model not found");
        assert_eq!(extract_error_message(br#"{"detail":"slow down"}"#), "slow down");
        assert_eq!(extract_error_message(b"gateway timeout"), "gateway timeout");
    }

    #[test]
    fn snippets_never_split_characters() {
        let body = "é".repeat(400);
        let out = snip(body.as_bytes(), 501);
        assert!(out.ends_with("..."));
        assert!(out.len() <= 504);
    }

    #[test]
    fn backoff_doubles() {
        assert_eq!(backoff(1), Duration::from_millis(200));
        assert_eq!(backoff(2), Duration::from_millis(400));
        assert_eq!(backoff(3), Duration::from_millis(800));
    }

    #[test]
    fn transient_classification() {
        let throttled = HttpError::Api {
            status: StatusCode::TOO_MANY_REQUESTS,
            message: String::new(),
            request_id: "-".into(),
        };
        let bad_request = HttpError::Api {
            status: StatusCode::BAD_REQUEST,
            message: String::new(),
            request_id: "-".into(),
        };
        assert!(throttled.is_transient());
        assert!(!bad_request.is_transient());
        assert!(HttpError::Network("reset".into()).is_transient());
        assert!(!HttpError::Decode("eof".into(), String::new()).is_transient());
    }
}
