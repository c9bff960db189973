use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::entry::{CaptureRequest, Entry, SavedEntry, SummarizeRequest, SummaryResponse};
use crate::error::StoreError;
use crate::store::EntryStore;

#[derive(Clone, Debug)]
pub struct StoreClientConfig {
    pub base_url: String,
    pub default_timeout: Duration,
    /// Retries for idempotent reads (`list`, `search`). Writes are sent once.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub max_error_body_bytes: usize,
}

impl StoreClientConfig {
    pub fn from_env() -> Self {
        let base_url = std::env::var("KB_BACKEND_URL")
            .unwrap_or_else(|_| "http://localhost:5000".to_string());

        let default_timeout = std::env::var("KB_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(30));

        let max_retries = std::env::var("KB_MAX_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(2);

        let initial_backoff = std::env::var("KB_RETRY_INITIAL_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or_else(|| Duration::from_millis(200));

        let max_backoff = std::env::var("KB_RETRY_MAX_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or_else(|| Duration::from_millis(2_000));

        let max_error_body_bytes = std::env::var("KB_MAX_ERROR_BODY_BYTES")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(8 * 1024);

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            default_timeout,
            max_retries,
            initial_backoff,
            max_backoff,
            max_error_body_bytes,
        }
    }

    /// Defaults for everything except the backend location.
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            default_timeout: Duration::from_secs(30),
            max_retries: 2,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_millis(2_000),
            max_error_body_bytes: 8 * 1024,
        }
    }
}

/// HTTP client for the knowledge-base backend (`/entries`, `/search`,
/// `/save_entry`, `/summarize`).
#[derive(Clone)]
pub struct EntryStoreClient {
    config: StoreClientConfig,
    http: reqwest::Client,
}

impl EntryStoreClient {
    pub fn new(config: StoreClientConfig) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .user_agent("embed-anywhere/kb-common")
            .build()?;
        Ok(Self { config, http })
    }

    async fn parse_json_response<T: for<'de> Deserialize<'de>>(
        resp: reqwest::Response,
        max_error_body_bytes: usize,
    ) -> Result<T, StoreError> {
        if resp.status().is_success() {
            let bytes = resp.bytes().await?;
            return Ok(serde_json::from_slice::<T>(&bytes)?);
        }
        Err(Self::to_upstream_error(resp, max_error_body_bytes).await)
    }

    async fn to_upstream_error(resp: reqwest::Response, max_error_body_bytes: usize) -> StoreError {
        let status = resp.status();
        let body = read_limited_text(resp, max_error_body_bytes).await;
        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .ok()
            .and_then(ErrorEnvelope::into_message)
            .unwrap_or(body);
        StoreError::Upstream { status, message }
    }

    async fn request_with_retry<T, Fut, F>(&self, op: &'static str, mut f: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, StoreError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match f().await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    if attempt > self.config.max_retries || !should_retry(&e) {
                        return Err(e);
                    }
                    let delay = backoff_delay(
                        self.config.initial_backoff,
                        self.config.max_backoff,
                        attempt - 1,
                    );
                    warn!(
                        op,
                        attempt,
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "backend request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[async_trait]
impl EntryStore for EntryStoreClient {
    async fn list_entries(&self) -> Result<Vec<Entry>, StoreError> {
        let url = format!("{}/entries", self.config.base_url);
        debug!(%url, "listing entries");
        self.request_with_retry("list", || async {
            let resp = self
                .http
                .get(&url)
                .timeout(self.config.default_timeout)
                .send()
                .await?;
            Self::parse_json_response(resp, self.config.max_error_body_bytes).await
        })
        .await
        .inspect_err(|e| warn!(error = %e, "list entries failed"))
    }

    async fn search_entries(&self, query: &str) -> Result<Vec<Entry>, StoreError> {
        if query.trim().is_empty() {
            return Err(StoreError::Validation("search query must not be empty".to_string()));
        }
        let url = format!("{}/search", self.config.base_url);
        debug!(query, "searching entries");
        self.request_with_retry("search", || async {
            let resp = self
                .http
                .get(&url)
                .query(&[("q", query)])
                .timeout(self.config.default_timeout)
                .send()
                .await?;
            Self::parse_json_response(resp, self.config.max_error_body_bytes).await
        })
        .await
        .inspect_err(|e| warn!(error = %e, query, "search failed"))
    }

    async fn save_entry(&self, request: &CaptureRequest) -> Result<SavedEntry, StoreError> {
        if request.content.trim().is_empty() {
            return Err(StoreError::Validation("content must not be empty".to_string()));
        }
        let url = format!("{}/save_entry", self.config.base_url);
        debug!(page_url = %request.page_url, "saving entry");
        let resp = self
            .http
            .post(&url)
            .timeout(self.config.default_timeout)
            .json(request)
            .send()
            .await
            .inspect_err(|e| warn!(error = %e, "save entry failed"))?;

        match Self::parse_json_response::<SavedEntry>(resp, self.config.max_error_body_bytes).await {
            Err(StoreError::Upstream { status, message })
                if status == StatusCode::BAD_REQUEST
                    || status == StatusCode::UNPROCESSABLE_ENTITY =>
            {
                warn!(%status, %message, "backend rejected entry");
                Err(StoreError::Validation(message))
            }
            other => other.inspect_err(|e| warn!(error = %e, "save entry failed")),
        }
    }

    async fn summarize(&self, content: &str) -> Result<String, StoreError> {
        let url = format!("{}/summarize", self.config.base_url);
        debug!(content_len = content.len(), "requesting summary");
        let resp = self
            .http
            .post(&url)
            .timeout(self.config.default_timeout)
            .json(&SummarizeRequest {
                content: content.to_string(),
            })
            .send()
            .await
            .inspect_err(|e| warn!(error = %e, "summarize failed"))?;
        let parsed: SummaryResponse =
            Self::parse_json_response(resp, self.config.max_error_body_bytes)
                .await
                .inspect_err(|e| warn!(error = %e, "summarize failed"))?;
        Ok(parsed.summary)
    }
}

fn should_retry(err: &StoreError) -> bool {
    match err {
        StoreError::Network(e) => e.is_timeout() || e.is_connect() || e.is_request(),
        StoreError::Upstream { status, .. } => {
            *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
        }
        StoreError::InvalidJson(_) | StoreError::Validation(_) => false,
    }
}

fn backoff_delay(initial: Duration, max: Duration, exponent: u32) -> Duration {
    let mult = 1u128.checked_shl(exponent).unwrap_or(u128::MAX);
    let base_ms = initial.as_millis().saturating_mul(mult);
    let capped_ms = std::cmp::min(base_ms, max.as_millis()) as u64;
    let jitter_cap = std::cmp::max(1, capped_ms / 4);
    Duration::from_millis(capped_ms.saturating_add(pseudo_jitter_ms(jitter_cap)))
}

fn pseudo_jitter_ms(max_inclusive: u64) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0));
    (now.subsec_nanos() as u64) % (max_inclusive + 1)
}

async fn read_limited_text(resp: reqwest::Response, max_bytes: usize) -> String {
    match resp.bytes().await {
        Ok(mut b) => {
            if b.len() > max_bytes {
                b.truncate(max_bytes);
            }
            String::from_utf8_lossy(&b).to_string()
        }
        Err(e) => {
            warn!(error = %e, "failed to read backend error body");
            "<failed to read error body>".to_string()
        }
    }
}

/// Flask-style error bodies: `{"error": "..."}` or `{"message": "..."}`.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<serde_json::Value>,
    message: Option<String>,
}

impl ErrorEnvelope {
    fn into_message(self) -> Option<String> {
        match (self.error, self.message) {
            (Some(serde_json::Value::String(s)), _) => Some(s),
            (Some(other), _) if !other.is_null() => Some(other.to_string()),
            (_, Some(m)) => Some(m),
            _ => None,
        }
    }
}
