//! Error taxonomy for the request pipeline and streaming protocols
//!
//! Four classes cover every non-streaming failure:
//!
//! - [`UsageError`]: a caller/programmer mistake detected before any
//!   transport activity; never worth retrying
//! - [`ClientError::Validation`]: a schema rejection on either side of the
//!   wire, tagged with the stage it happened at
//! - [`ClientError::Network`]: connectivity failure, timeout or abort; the
//!   only class a caller might reasonably retry (the pipeline itself never
//!   retries)
//! - [`ApiError`]: the server answered, but with a non-2xx status or a body
//!   that does not decode as the declared response shape
//!
//! Streaming failures use [`crate::stream::StreamError`] instead: per-chunk
//! problems travel in-band so one bad frame does not abort a healthy
//! connection.

use http::{Method, StatusCode};
use serde_json::Value;
use std::error::Error;
use std::fmt;
use thiserror::Error;
use typact_schema::ValidationFailure;

/// Which declared input kind a request-stage validation error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Query,
    Param,
    Json,
    Form,
    /// Outgoing WebSocket message.
    Message,
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InputKind::Query => "query",
            InputKind::Param => "param",
            InputKind::Json => "json",
            InputKind::Form => "form",
            InputKind::Message => "message",
        };
        f.write_str(name)
    }
}

/// Where a validation error occurred.
#[derive(Debug, Clone)]
pub enum ValidationStage {
    Request { input: InputKind },
    /// Carries the status and raw body so a contract mismatch can be
    /// diagnosed without replaying the call.
    Response { status: StatusCode, raw_body: String },
}

impl fmt::Display for ValidationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationStage::Request { input } => write!(f, "request ({input})"),
            ValidationStage::Response { status, .. } => write!(f, "response (status {status})"),
        }
    }
}

/// Caller mistakes caught before the transport is touched.
#[derive(Debug, Error)]
pub enum UsageError {
    #[error("malformed endpoint key '{key}', expected '@<method>/<path>'")]
    MalformedKey { key: String },

    #[error("unknown http method '{token}' in endpoint key '{key}'")]
    UnknownMethod { key: String, token: String },

    #[error("endpoint '{key}' is not registered")]
    EndpointNotFound { key: String },

    #[error("missing path parameter '{name}' for {method} {url}")]
    MissingPathParam { name: String, method: Method, url: String },

    #[error("endpoint '{key}' is {actual}, not {expected}")]
    WrongOutputKind { key: String, expected: &'static str, actual: &'static str },

    /// A validated input value could not be serialized into its wire form.
    /// Detected before any transport activity; never worth retrying.
    #[error("could not encode {what}: {reason}")]
    Encode { what: &'static str, reason: String },
}

impl UsageError {
    pub fn malformed_key(key: impl ToString) -> Self {
        Self::MalformedKey { key: key.to_string() }
    }

    pub fn unknown_method(key: impl ToString, token: impl ToString) -> Self {
        Self::UnknownMethod { key: key.to_string(), token: token.to_string() }
    }

    pub fn endpoint_not_found(key: impl ToString) -> Self {
        Self::EndpointNotFound { key: key.to_string() }
    }

    pub fn missing_path_param(name: impl ToString, method: Method, url: impl ToString) -> Self {
        Self::MissingPathParam { name: name.to_string(), method, url: url.to_string() }
    }

    pub fn wrong_output_kind(key: impl ToString, expected: &'static str, actual: &'static str) -> Self {
        Self::WrongOutputKind { key: key.to_string(), expected, actual }
    }

    pub fn encode(what: &'static str, reason: impl ToString) -> Self {
        Self::Encode { what, reason: reason.to_string() }
    }
}

/// Best-effort parse of a non-2xx response body: any JSON value, plain
/// text, or nothing at all must be tolerated.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorBody {
    Json(Value),
    Text(String),
    Empty,
}

impl ErrorBody {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            return ErrorBody::Empty;
        }
        if let Ok(value) = serde_json::from_slice::<Value>(bytes) {
            return ErrorBody::Json(value);
        }
        match std::str::from_utf8(bytes) {
            Ok(text) => ErrorBody::Text(text.to_string()),
            Err(_) => ErrorBody::Empty,
        }
    }
}

impl fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorBody::Json(value) => write!(f, "{value}"),
            ErrorBody::Text(text) => f.write_str(text),
            ErrorBody::Empty => f.write_str("(no body)"),
        }
    }
}

/// The server answered, but not with the declared contract.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("api error: status {status} for {method} {url}: {body}")]
    Status { status: StatusCode, method: Method, url: String, body: ErrorBody },

    #[error("undecodable response body (status {status}) for {method} {url}: {reason}")]
    UndecodableBody { status: StatusCode, method: Method, url: String, reason: String },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Status { status, .. } | ApiError::UndecodableBody { status, .. } => *status,
        }
    }
}

/// Top-level error returned at the call boundary.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("usage error: {0}")]
    Usage(#[from] UsageError),

    #[error("{stage} validation failed: {failure}")]
    Validation { stage: ValidationStage, failure: ValidationFailure },

    #[error("network error (timeout: {timeout}): {source}")]
    Network {
        timeout: bool,
        source: Box<dyn Error + Send + Sync>,
    },

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl ClientError {
    pub fn request_validation(input: InputKind, failure: ValidationFailure) -> Self {
        Self::Validation { stage: ValidationStage::Request { input }, failure }
    }

    pub fn response_validation(status: StatusCode, raw_body: impl Into<String>, failure: ValidationFailure) -> Self {
        Self::Validation { stage: ValidationStage::Response { status, raw_body: raw_body.into() }, failure }
    }

    pub fn network(source: impl Error + Send + Sync + 'static) -> Self {
        Self::Network { timeout: false, source: Box::new(source) }
    }

    pub fn timeout(source: impl Error + Send + Sync + 'static) -> Self {
        Self::Network { timeout: true, source: Box::new(source) }
    }

    /// True for the one class a caller might want to retry.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}
