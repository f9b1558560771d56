//! Outcome classification
//!
//! Folds every way a submission can end into a [`RemoteOperationResult`].
//! The order is fixed:
//!
//! 1. No response (connect, timeout, send or body failure) => network failure
//! 2. Infrastructure status (401, 408, 429, 5xx) => network failure
//! 3. Response without a JSON-RPC envelope => network failure on 2xx,
//!    business rejection on other 4xx
//! 4. `error` envelope => network failure for the session-expired code,
//!    business rejection for any other code; an error without a code falls
//!    back to message matching
//! 5. `result` with `success: false` or `message_type: "error"` => business
//!    rejection
//! 6. Anything else, including `"result": null`, => success

use reqwest::StatusCode;
use serde_json::Value;

use fieldsync_core::domain::{NetworkCause, RemoteOperationResult};

use crate::envelope::{RpcError, RpcResponse, SubmitResult};

/// JSON-RPC error code the backend uses for an expired session
pub const SESSION_EXPIRED_CODE: i64 = 100;

/// Message fragments that indicate an infrastructure problem reported
/// through an error envelope without a code
const TRANSIENT_MARKERS: &[&str] = &[
    "timeout",
    "timed out",
    "connection refused",
    "connection reset",
    "connection aborted",
    "network is unreachable",
    "temporarily unavailable",
    "too many requests",
    "session expired",
    "reset by peer",
    "broken pipe",
    "could not serialize access",
];

/// Classifies a request that produced no usable response
pub fn classify_transport_error(err: &reqwest::Error) -> RemoteOperationResult {
    let cause = if err.is_timeout() {
        NetworkCause::Timeout
    } else if err.is_connect() {
        NetworkCause::Connect
    } else if err.is_body() || err.is_decode() {
        NetworkCause::Body
    } else if err.is_request() {
        NetworkCause::Request
    } else if let Some(status) = err.status() {
        NetworkCause::ServerStatus(status.as_u16())
    } else {
        NetworkCause::Other
    };
    RemoteOperationResult::network(cause, err.to_string())
}

/// Classifies a received response
pub fn classify_response(status: StatusCode, body: &[u8]) -> RemoteOperationResult {
    if is_infrastructure_status(status) {
        return RemoteOperationResult::network(
            NetworkCause::ServerStatus(status.as_u16()),
            format!("HTTP {status}: {}", body_excerpt(body)),
        );
    }

    let envelope: RpcResponse = match serde_json::from_slice(body) {
        Ok(envelope) => envelope,
        Err(err) if status.is_success() => {
            return RemoteOperationResult::network(
                NetworkCause::MalformedResponse,
                format!("unparseable response body: {err}"),
            );
        }
        Err(_) => {
            return RemoteOperationResult::rejection(
                format!("HTTP {status}: {}", body_excerpt(body)),
                serde_json::json!({ "status": status.as_u16() }),
            );
        }
    };

    if let Some(error) = envelope.error {
        return classify_rpc_error(&error);
    }

    match envelope.result {
        Some(Value::Object(fields)) => {
            let result = SubmitResult::new(&fields);
            if result.is_rejection() || !status.is_success() {
                let message = result
                    .message()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("rejected by backend (HTTP {status})"));
                RemoteOperationResult::rejection(message, Value::Object(fields))
            } else {
                RemoteOperationResult::success(result.server_id(), Value::Object(fields))
            }
        }
        Some(other) if status.is_success() => {
            // Bare result: the new record id, `true`, or null from an action
            // that returns nothing
            let server_id = other.as_i64();
            RemoteOperationResult::success(server_id, other)
        }
        Some(other) => {
            RemoteOperationResult::rejection(format!("rejected by backend (HTTP {status})"), other)
        }
        None if !status.is_success() => RemoteOperationResult::rejection(
            format!("HTTP {status}: {}", body_excerpt(body)),
            serde_json::json!({ "status": status.as_u16() }),
        ),
        None => RemoteOperationResult::network(
            NetworkCause::MalformedResponse,
            "response has neither result nor error",
        ),
    }
}

fn classify_rpc_error(error: &RpcError) -> RemoteOperationResult {
    let message = error.best_message();

    if error.code == Some(SESSION_EXPIRED_CODE) {
        return RemoteOperationResult::network(NetworkCause::SessionExpired, message);
    }
    if is_transient_error(error) {
        return RemoteOperationResult::network(NetworkCause::Other, message);
    }

    let details = serde_json::json!({
        "code": error.code,
        "message": error.message,
        "data": error.data,
    });
    RemoteOperationResult::rejection(message, details)
}

/// Statuses that mean "no authoritative answer": authentication, timeouts,
/// throttling and server-side failures
pub fn is_infrastructure_status(status: StatusCode) -> bool {
    status.is_server_error()
        || matches!(
            status,
            StatusCode::UNAUTHORIZED | StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS
        )
}

/// Whether an error envelope reports an infrastructure problem. A coded
/// error is authoritative; only a code-less one is judged by its wording.
pub fn is_transient_error(error: &RpcError) -> bool {
    match error.code {
        Some(code) => code == SESSION_EXPIRED_CODE,
        None => looks_transient(&error.best_message()),
    }
}

/// Last-resort check of an error message for infrastructure wording
pub fn looks_transient(message: &str) -> bool {
    let lower = message.to_lowercase();
    TRANSIENT_MARKERS.iter().any(|marker| lower.contains(marker))
}

fn body_excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let trimmed = text.trim();
    if trimmed.chars().count() > 200 {
        let cut: String = trimmed.chars().take(200).collect();
        format!("{cut}...")
    } else {
        trimmed.to_string()
    }
}
