//! Error taxonomy and status-code classification for the Neofin client.
//!
//! # Design
//! Every failure surfaces as one `ApiError` value. Variants that originate
//! from an HTTP response carry the status code, the extracted message and
//! the raw parsed body so callers can build their own retry policies by
//! matching on the variant (or on `ErrorKind`) instead of on message text.

use serde_json::Value;
use thiserror::Error;

/// Fieldless discriminant of `ApiError`, handy for comparisons and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Network,
    Authentication,
    NotFound,
    Client,
    Server,
    Unclassified,
}

/// Errors returned by the Neofin client.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    /// Missing or invalid credentials, environment or call arguments.
    /// Always raised before any network activity.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Connection, DNS, timeout or body-read failure, regardless of the
    /// underlying transport error.
    #[error("network error: {0}")]
    Network(String),

    /// The API answered 401.
    #[error("authentication failed: {message}")]
    Authentication {
        message: String,
        status: u16,
        body: Value,
    },

    /// The API answered 404.
    #[error("not found: {message}")]
    NotFound {
        message: String,
        status: u16,
        body: Value,
    },

    /// The API answered 400 or 402..=499.
    #[error("client error (HTTP {status}): {message}")]
    Client {
        message: String,
        status: u16,
        body: Value,
    },

    /// The API answered 5xx.
    #[error("server error (HTTP {status}): {message}")]
    Server {
        message: String,
        status: u16,
        body: Value,
    },

    /// Any status outside the ranges above.
    #[error("Unhandled HTTP status code: {status} - {message}")]
    Unclassified {
        message: String,
        status: u16,
        body: Value,
    },
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Configuration(_) => ErrorKind::Configuration,
            ApiError::Network(_) => ErrorKind::Network,
            ApiError::Authentication { .. } => ErrorKind::Authentication,
            ApiError::NotFound { .. } => ErrorKind::NotFound,
            ApiError::Client { .. } => ErrorKind::Client,
            ApiError::Server { .. } => ErrorKind::Server,
            ApiError::Unclassified { .. } => ErrorKind::Unclassified,
        }
    }

    /// Human-readable message without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            ApiError::Configuration(message) | ApiError::Network(message) => message,
            ApiError::Authentication { message, .. }
            | ApiError::NotFound { message, .. }
            | ApiError::Client { message, .. }
            | ApiError::Server { message, .. }
            | ApiError::Unclassified { message, .. } => message,
        }
    }

    /// HTTP status code, for errors produced from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Configuration(_) | ApiError::Network(_) => None,
            ApiError::Authentication { status, .. }
            | ApiError::NotFound { status, .. }
            | ApiError::Client { status, .. }
            | ApiError::Server { status, .. }
            | ApiError::Unclassified { status, .. } => Some(*status),
        }
    }

    /// Raw parsed response body, for errors produced from a response.
    pub fn body(&self) -> Option<&Value> {
        match self {
            ApiError::Configuration(_) | ApiError::Network(_) => None,
            ApiError::Authentication { body, .. }
            | ApiError::NotFound { body, .. }
            | ApiError::Client { body, .. }
            | ApiError::Server { body, .. }
            | ApiError::Unclassified { body, .. } => Some(body),
        }
    }

    /// True for kinds a caller may reasonably retry (network and 5xx).
    pub fn is_transient(&self) -> bool {
        matches!(self.kind(), ErrorKind::Network | ErrorKind::Server)
    }
}

/// Turn a status code and parsed body into the response outcome.
///
/// 2xx yields the body itself, with `Null` (empty response) replaced by an
/// empty object. Everything else goes through `classify_error`.
pub fn classify(status: u16, body: Value) -> Result<Value, ApiError> {
    if (200..=299).contains(&status) {
        return Ok(match body {
            Value::Null => Value::Object(serde_json::Map::new()),
            other => other,
        });
    }
    Err(classify_error(status, body))
}

/// Map a non-2xx status code to its `ApiError` variant.
pub fn classify_error(status: u16, body: Value) -> ApiError {
    let message = extract_message(&body, status);
    match status {
        401 => ApiError::Authentication { message, status, body },
        404 => ApiError::NotFound { message, status, body },
        400 | 402..=499 => ApiError::Client { message, status, body },
        500..=599 => ApiError::Server { message, status, body },
        _ => ApiError::Unclassified { message, status, body },
    }
}

/// Pick the most specific message the body offers.
///
/// Objects are searched for `message`, then `error`, then
/// `errors[0].detail`. A non-empty bare string is used verbatim. Anything
/// else falls back to `API Error Status <status>`.
pub fn extract_message(body: &Value, status: u16) -> String {
    let found = match body {
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| map.get("error").and_then(Value::as_str))
            .or_else(|| body.pointer("/errors/0/detail").and_then(Value::as_str)),
        Value::String(text) if !text.is_empty() => Some(text.as_str()),
        _ => None,
    };
    match found {
        Some(message) => message.to_string(),
        None => format!("API Error Status {status}"),
    }
}
