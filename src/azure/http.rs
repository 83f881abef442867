//! Request execution shared by every ARM call.
//!
//! Maps transport failures and HTTP status codes onto [`ClientError`] and
//! retries the retryable ones with exponential backoff.

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{RequestBuilder, StatusCode};
use tracing::{debug, warn};

use super::error::ClientError;
use super::wire::ArmErrorBody;

const MAX_RETRY_AFTER_SECS: u64 = 30;
const MAX_BACKOFF_MS: u64 = 10_000;

/// HTTP client shared by the ARM client and the credential chain.
pub fn build_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("azct/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Successful (non-error) response with its body read.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, ClientError> {
        serde_json::from_str(&self.body).map_err(|e| {
            warn!(error = %e, "Failed to parse ARM response");
            ClientError::rejected("InvalidResponse", format!("unexpected response body: {e}"))
        })
    }
}

pub async fn execute(request: RequestBuilder, method: &str, url: &str) -> Result<HttpResponse, ClientError> {
    debug!(method, url, "ARM request");

    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            ClientError::transient(format!("request timed out: {e}"))
        } else {
            ClientError::transient(format!("network error: {e}"))
        }
    })?;

    let status = response.status();
    let headers = response.headers().clone();
    debug!(method, url, status = status.as_u16(), "ARM response");

    let body = response
        .text()
        .await
        .map_err(|e| ClientError::transient(format!("failed to read response body: {e}")))?;

    if status.is_success() || status.is_redirection() {
        return Ok(HttpResponse {
            status,
            headers,
            body,
        });
    }

    Err(error_for_status(status, &headers, &body))
}

/// Execute with retries for [`ClientError::Transient`] failures.
pub async fn execute_with_retry(
    request: RequestBuilder,
    method: &str,
    url: &str,
    max_retries: u32,
) -> Result<HttpResponse, ClientError> {
    let mut attempt = 0;
    loop {
        let Some(req) = request.try_clone() else {
            warn!(url, "Cannot clone request, retry disabled");
            return execute(request, method, url).await;
        };

        match execute(req, method, url).await {
            Err(e) if attempt < max_retries && e.is_retryable() => {
                let delay = retry_delay(&e, attempt);
                warn!(
                    url,
                    attempt = attempt + 1,
                    max_retries,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "Request failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

fn error_for_status(status: StatusCode, headers: &HeaderMap, body: &str) -> ClientError {
    let detail = serde_json::from_str::<ArmErrorBody>(body)
        .ok()
        .and_then(|b| b.error);
    let code = detail
        .as_ref()
        .map_or_else(|| format!("HTTP {}", status.as_u16()), |d| d.code.clone());
    let message = detail
        .map(|d| d.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());

    match status {
        StatusCode::UNAUTHORIZED => ClientError::Auth(message),
        StatusCode::NOT_FOUND => ClientError::NotFound(message),
        StatusCode::TOO_MANY_REQUESTS => ClientError::Transient {
            message: format!("throttled: {message}"),
            retry_after: headers
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(|secs| Duration::from_secs(secs.min(MAX_RETRY_AFTER_SECS))),
        },
        s if s.is_server_error() => ClientError::transient(format!("HTTP {}: {message}", s.as_u16())),
        _ => ClientError::Rejected { code, message },
    }
}

fn retry_delay(error: &ClientError, attempt: u32) -> Duration {
    match error {
        ClientError::Transient {
            retry_after: Some(delay),
            ..
        } => *delay,
        _ => backoff_delay(attempt),
    }
}

/// 100ms, 200ms, 400ms, ... capped at ten seconds.
pub fn backoff_delay(attempt: u32) -> Duration {
    let delay_ms = 100_u64.saturating_mul(1_u64 << attempt.min(20));
    Duration::from_millis(delay_ms.min(MAX_BACKOFF_MS))
}
