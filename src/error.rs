//! Error types for the content relay
//!
//! Stage-level errors are defined here and folded into [`PipelineError`],
//! which carries the HTTP status the Error Responder answers with.

use axum::http::StatusCode;
use thiserror::Error;

// == Store Error ==
/// Failures raised by a cache backend.
///
/// On the read path these are logged and treated as misses; on the
/// invalidation path they become [`PipelineError::Invalidation`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached (connection refused, pool exhausted, ...)
    #[error("cache store unavailable: {0}")]
    Unavailable(String),

    /// The store did not answer within its timeout
    #[error("cache store timed out after {0} ms")]
    Timeout(u64),

    /// Key rejected by the store
    #[error("invalid cache key: {0}")]
    InvalidKey(String),

    /// The store is full and could not evict
    #[error("cache full: {0}")]
    CapacityExhausted(String),
}

// == Upstream Error ==
/// A failed upstream fetch.
///
/// `status` is `None` when the upstream never answered (transport failure
/// or timeout).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("upstream request failed ({}): {body}", describe_status(.status))]
pub struct UpstreamError {
    pub status: Option<u16>,
    pub body: String,
}

fn describe_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "no response".to_string(),
    }
}

impl UpstreamError {
    pub fn with_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            body: body.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            body: message.into(),
        }
    }
}

// == Render Error ==
/// Template lookup or evaluation failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("template not found: {0}")]
    MissingTemplate(String),

    #[error("template {template} failed: {message}")]
    Evaluation { template: String, message: String },
}

// == Config Error ==
/// Bad route or resource configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ConfigError(pub String);

// == Pipeline Error ==
/// Everything that can surface to a client from the read or control plane.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("route configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("payload does not match {expected} shape: {detail}")]
    Shape { expected: String, detail: String },

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("cache invalidation failed: {0}")]
    Invalidation(StoreError),
}

impl PipelineError {
    pub fn shape(expected: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Shape {
            expected: expected.into(),
            detail: detail.into(),
        }
    }

    /// Status code a client sees for this error.
    ///
    /// Upstream error statuses pass through unchanged; an upstream that never
    /// answered, or answered with a non-error code, maps to 502.
    pub fn status(&self) -> StatusCode {
        match self {
            PipelineError::Config(_) => StatusCode::BAD_REQUEST,
            PipelineError::Upstream(err) => err
                .status
                .and_then(|code| StatusCode::from_u16(code).ok())
                .filter(|code| code.is_client_error() || code.is_server_error())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            PipelineError::Shape { .. }
            | PipelineError::Render(_)
            | PipelineError::Invalidation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for pipeline stages.
pub type Result<T> = std::result::Result<T, PipelineError>;
