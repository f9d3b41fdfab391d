//! Shared reqwest plumbing for the remote clients.
//!
//! One request per call: no retries, no backoff. Every call is bounded by
//! the client timeout.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde_json::Value;

use crate::types::{CritiqueError, CritiqueResult, Service};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Longest error body excerpt carried into an error message.
const MAX_ERROR_BODY: usize = 300;

/// Build the HTTP client used by both services.
pub fn build_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("screen-critic/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_default()
}

/// Map a transport-level failure to a remote service error.
pub fn transport_error(service: Service, err: reqwest::Error) -> CritiqueError {
    let message = if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        format!("connection failed: {err}")
    } else if err.is_decode() {
        format!("malformed response: {err}")
    } else {
        err.to_string()
    };
    CritiqueError::remote(service, message)
}

/// Pass 2xx responses through; turn everything else into a typed error.
pub async fn ensure_success(service: Service, response: Response) -> CritiqueResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = error_detail(&body);
    tracing::debug!("{service} responded {status}: {detail}");

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(CritiqueError::auth(service, format!("{status}: {detail}")))
        }
        _ => Err(CritiqueError::remote(service, format!("{status}: {detail}"))),
    }
}

/// Pull a human-readable message out of an error body.
///
/// Understands `{"error": {"message": ..}}`, `{"error": ".."}` and
/// `{"detail": ".."}`; anything else is returned as a trimmed excerpt.
pub fn error_detail(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        let message = ["/error/message", "/error", "/detail"]
            .iter()
            .find_map(|ptr| json.pointer(ptr).and_then(Value::as_str));
        if let Some(message) = message {
            return message.to_string();
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    trimmed.chars().take(MAX_ERROR_BODY).collect()
}
