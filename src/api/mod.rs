//! API Module
//!
//! HTTP surface of the relay.
//!
//! # Endpoints
//! - `GET <pattern>` - content routes registered on [`ContentRouter`]
//! - `POST <pattern>` - evict a cache key and reseed `_keys` pairs
//! - `DELETE <pattern>` - evict a cache key
//! - anything else - static asset or 404

pub mod handlers;
pub mod responder;
pub mod routes;

pub use handlers::AppState;
pub use responder::{accepts_html, ErrorResponder};
pub use routes::ContentRouter;
