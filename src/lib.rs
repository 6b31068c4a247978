//! Headless Relay - a cache-aside content relay for headless CMS APIs
//!
//! Serves HTML by resolving each request to an upstream content path,
//! reading the raw payload through a route cache, shaping it into a view
//! model and rendering a template. A control plane evicts and reseeds route
//! cache entries.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod invalidate;
pub mod models;
pub mod pipeline;
pub mod render;
pub mod resource;
pub mod shape;
pub mod tasks;
pub mod upstream;

pub use api::{AppState, ContentRouter};
pub use config::Config;
pub use error::{PipelineError, Result};
pub use pipeline::Pipeline;
pub use resource::RouteOptions;
pub use tasks::spawn_cleanup_task;
