//! Request and Response models
//!
//! DTOs for the control-plane request bodies and the JSON responses the
//! relay sends itself.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{InvalidationRequest, ReseedBody};
pub use responses::{ErrorResponse, StatusAck};
