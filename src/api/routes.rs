//! API Routes
//!
//! [`ContentRouter`] is the application object: read and invalidation routes
//! are registered on it, then [`ContentRouter::into_router`] assembles the
//! Axum router with its middleware stack.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::Request,
    handler::Handler,
    http::{header, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Router,
};
use tower_http::{
    compression::CompressionLayer, services::ServeDir, set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing::info;

use super::handlers::{
    content_handler, evict_handler, not_found_handler, reseed_handler, AppState, KEY_PARAM,
};
use crate::error::ConfigError;
use crate::resource::{pattern_captures, ResourceKind, RouteConfig, RouteOptions};

/// Cache lifetime for files served from the static directory (4 days).
pub const STATIC_MAX_AGE_SECS: u64 = 345_600;

/// Builder for the relay's router.
///
/// Every `route_*` method validates its configuration and fails with
/// [`ConfigError`] instead of registering a route that could never serve.
pub struct ContentRouter {
    state: AppState,
    router: Router<AppState>,
    patterns: BTreeSet<String>,
    /// Read routes by pattern, for invalidation registered on the same URL
    content_routes: HashMap<String, Arc<RouteConfig>>,
    invalidated: BTreeSet<String>,
    static_dir: Option<PathBuf>,
}

impl ContentRouter {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            router: Router::new(),
            patterns: BTreeSet::new(),
            content_routes: HashMap::new(),
            invalidated: BTreeSet::new(),
            static_dir: None,
        }
    }

    /// Serves files under `dir` for paths no route matches.
    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = Some(dir.into());
        self
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    // == Read Routes ==
    pub fn route_item(self, pattern: &str, template: &str, options: RouteOptions) -> Result<Self, ConfigError> {
        self.register(ResourceKind::Item, pattern, template, options)
    }

    pub fn route_section(self, pattern: &str, template: &str, options: RouteOptions) -> Result<Self, ConfigError> {
        self.register(ResourceKind::List, pattern, template, options)
    }

    pub fn route_multi(self, pattern: &str, template: &str, options: RouteOptions) -> Result<Self, ConfigError> {
        self.register(ResourceKind::Multi, pattern, template, options)
    }

    pub fn route_static(self, pattern: &str, template: &str, options: RouteOptions) -> Result<Self, ConfigError> {
        self.register(ResourceKind::Static, pattern, template, options)
    }

    fn register(
        mut self,
        expected: ResourceKind,
        pattern: &str,
        template: &str,
        options: RouteOptions,
    ) -> Result<Self, ConfigError> {
        if options.kind() != expected {
            return Err(ConfigError(format!(
                "route {pattern} expects {expected} options, got {}",
                options.kind()
            )));
        }
        if !self.state.pipeline.engine().has_template(template) {
            return Err(ConfigError(format!(
                "route {pattern} uses unknown template `{template}`"
            )));
        }
        let route = Arc::new(RouteConfig::new(pattern, template, options)?);
        self.claim(pattern)?;

        info!(pattern = %pattern, kind = %expected, template = %template, "Registered content route");
        self.content_routes.insert(pattern.to_string(), Arc::clone(&route));
        self.router = self
            .router
            .route(pattern, get(content_handler).layer(Extension(route)));
        Ok(self)
    }

    // == Invalidation Routes ==
    /// Registers POST (evict and reseed) and DELETE (evict) on `pattern`.
    ///
    /// On the pattern of a cached read route, the target is the key a GET of
    /// the same URL reads. Any other pattern must capture `key`, which names
    /// the cache key to evict.
    pub fn route_cache(mut self, pattern: &str) -> Result<Self, ConfigError> {
        if let Some(route) = self.content_routes.get(pattern).cloned() {
            if route.kind() == ResourceKind::Static {
                return Err(ConfigError(format!(
                    "static route {pattern} is never cached"
                )));
            }
            if !self.invalidated.insert(pattern.to_string()) {
                return Err(ConfigError(format!(
                    "invalidation on {pattern} is already registered"
                )));
            }

            info!(pattern = %pattern, kind = %route.kind(), "Registered invalidation on content route");
            self.router = self.router.route(
                pattern,
                post(reseed_handler)
                    .delete(evict_handler)
                    .layer(Extension(route)),
            );
            return Ok(self);
        }

        if !pattern_captures(pattern).contains(KEY_PARAM) {
            return Err(ConfigError(format!(
                "invalidation route {pattern} must capture `{KEY_PARAM}` or match a content route"
            )));
        }
        self.claim(pattern)?;
        self.invalidated.insert(pattern.to_string());

        info!(pattern = %pattern, "Registered invalidation route");
        self.router = self
            .router
            .route(pattern, post(reseed_handler).delete(evict_handler));
        Ok(self)
    }

    fn claim(&mut self, pattern: &str) -> Result<(), ConfigError> {
        if !pattern.starts_with('/') {
            return Err(ConfigError(format!("route {pattern} must start with `/`")));
        }
        if !self.patterns.insert(pattern.to_string()) {
            return Err(ConfigError(format!("route {pattern} is already registered")));
        }
        Ok(())
    }

    // == Assembly ==
    /// Builds the router with static fallback and middleware.
    ///
    /// # Middleware
    /// - Tracing: logs every request
    /// - Security headers: `nosniff`, `SAMEORIGIN` framing
    /// - Compression: gzip for clients that accept it
    /// - Trailing slash: `301` to the path without it, before any handler
    pub fn into_router(self) -> Router {
        let router = match self.static_dir {
            Some(dir) => {
                let not_found = not_found_handler.with_state(self.state.clone());
                let assets = ServeDir::new(dir)
                    .append_index_html_on_directories(false)
                    .call_fallback_on_method_not_allowed(true)
                    .not_found_service(not_found);
                let assets = Router::<()>::new()
                    .fallback_service(assets)
                    .layer(middleware::map_response(static_cache_control));
                self.router.fallback_service(assets)
            }
            None => self.router.fallback(not_found_handler),
        };

        router
            .layer(middleware::from_fn(redirect_trailing_slash))
            .layer(CompressionLayer::new())
            .layer(SetResponseHeaderLayer::overriding(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::X_FRAME_OPTIONS,
                HeaderValue::from_static("SAMEORIGIN"),
            ))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state)
    }
}

/// Long-lived caching for static assets that were actually found.
async fn static_cache_control(mut response: Response) -> Response {
    if response.status().is_success() {
        let value = format!("public, max-age={}", STATIC_MAX_AGE_SECS);
        if let Ok(value) = HeaderValue::from_str(&value) {
            response.headers_mut().insert(header::CACHE_CONTROL, value);
        }
    }
    response
}

/// Redirects `P/` to `P` for every path except the root.
///
/// Exactly one slash is removed. Leading slashes collapse to one so the
/// `Location` can never read as a protocol-relative URL (`//host`).
async fn redirect_trailing_slash(request: Request, next: Next) -> Response {
    let path = request.uri().path();
    if let Some(stripped) = path.strip_suffix('/').filter(|s| !s.is_empty()) {
        let target = format!("/{}", stripped.trim_start_matches('/'));
        let location = match request.uri().query() {
            Some(query) => format!("{}?{}", target, query),
            None => target,
        };
        return (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response();
    }
    next.run(request).await
}
