//! Error Responder
//!
//! Turns a [`PipelineError`] into the client response. HTML-preferring
//! clients get the error template, everyone else a JSON body.

use std::sync::Arc;

use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use tracing::warn;

use crate::error::PipelineError;
use crate::models::ErrorResponse;
use crate::render::TemplateEngine;

/// Builds error responses; never fails.
#[derive(Clone)]
pub struct ErrorResponder {
    engine: Arc<dyn TemplateEngine>,
    template: String,
}

impl ErrorResponder {
    pub fn new(engine: Arc<dyn TemplateEngine>, template: impl Into<String>) -> Self {
        Self {
            engine,
            template: template.into(),
        }
    }

    pub async fn respond(&self, err: &PipelineError, accepts_html: bool) -> Response {
        self.respond_status(err.status(), &err.to_string(), accepts_html)
            .await
    }

    /// Same as [`respond`](Self::respond) for failures that never entered
    /// the pipeline, such as an unmatched path.
    pub async fn respond_status(&self, status: StatusCode, message: &str, accepts_html: bool) -> Response {
        if !accepts_html {
            let body = ErrorResponse::new(status.as_u16(), message);
            return (status, Json(body)).into_response();
        }

        match self.engine.render_error(&self.template, status).await {
            Ok(page) => (status, Html(page)).into_response(),
            Err(err) => {
                warn!(template = %self.template, error = %err, "Error page failed to render");
                status.into_response()
            }
        }
    }
}

// == Content Negotiation ==
/// Whether the client accepts an HTML response.
///
/// A missing `Accept` header means anything goes. Otherwise `text/html`,
/// `text/*` or `*/*` must be listed with a non-zero quality.
pub fn accepts_html(headers: &HeaderMap) -> bool {
    let Some(accept) = headers.get(header::ACCEPT) else {
        return true;
    };
    let Ok(accept) = accept.to_str() else {
        return false;
    };
    if accept.trim().is_empty() {
        return true;
    }

    accept.split(',').any(|range| {
        let mut parts = range.split(';');
        let media = parts.next().unwrap_or("").trim().to_ascii_lowercase();
        if !matches!(media.as_str(), "text/html" | "text/*" | "*/*") {
            return false;
        }
        let quality = parts
            .filter_map(|param| param.trim().strip_prefix("q="))
            .find_map(|q| q.trim().parse::<f32>().ok())
            .unwrap_or(1.0);
        quality > 0.0
    })
}
