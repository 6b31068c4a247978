//! Response DTOs
//!
//! Bodies for control-plane acknowledgments and structured errors.

use serde::Serialize;

/// Acknowledgment body for a successful evict-and-reseed.
#[derive(Debug, Clone, Serialize)]
pub struct StatusAck {
    #[serde(rename = "_status")]
    pub status: u16,
}

impl StatusAck {
    pub fn ok() -> Self {
        Self { status: 200 }
    }
}

/// Structured error body for clients that do not accept HTML.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    #[serde(rename = "_status")]
    pub status: u16,
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    pub fn new(status: u16, error: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
        }
    }
}
