//! Rendering stage.
//!
//! The pipeline only knows templates by name through [`TemplateEngine`];
//! [`SiteTemplates`] is the compiled-in implementation used by the binary.

mod site;

use async_trait::async_trait;
use axum::http::StatusCode;

use crate::error::RenderError;
use crate::shape::ViewModel;

pub use site::SiteTemplates;

/// Named-template renderer.
#[async_trait]
pub trait TemplateEngine: Send + Sync {
    /// Renders `view` with the template called `template`.
    async fn render(&self, template: &str, view: &ViewModel) -> Result<String, RenderError>;

    /// Renders the error page for `status`.
    async fn render_error(&self, template: &str, status: StatusCode) -> Result<String, RenderError>;

    /// Whether `template` can be rendered at all. Checked at route registration.
    fn has_template(&self, template: &str) -> bool;
}
