//! API Handlers
//!
//! Request handlers for content routes, invalidation routes and the
//! not-found fallback.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    Extension, Json,
};
use chrono::{DateTime, Utc};

use crate::api::responder::{accepts_html, ErrorResponder};
use crate::error::{ConfigError, PipelineError};
use crate::invalidate::Invalidator;
use crate::models::{InvalidationRequest, ReseedBody, StatusAck};
use crate::pipeline::{CacheStatus, Pipeline, Rendered};
use crate::resource::{InboundRequest, RouteConfig};

/// Route parameter that names the target cache key on invalidation routes.
pub const KEY_PARAM: &str = "key";

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub invalidator: Invalidator,
    pub responder: ErrorResponder,
    /// Freshness window advertised on successful content responses
    pub freshness: Duration,
}

impl AppState {
    pub fn new(pipeline: Pipeline, error_template: impl Into<String>, freshness: Duration) -> Self {
        let invalidator = Invalidator::new(pipeline.cache(), pipeline.ttl());
        let responder = ErrorResponder::new(pipeline.engine(), error_template);
        Self {
            pipeline: Arc::new(pipeline),
            invalidator,
            responder,
            freshness,
        }
    }
}

// == Content ==
fn inbound(
    method: Method,
    uri: &Uri,
    params: Option<Path<HashMap<String, String>>>,
    query: Option<Query<BTreeMap<String, String>>>,
) -> InboundRequest {
    InboundRequest {
        method,
        path: uri.path().to_string(),
        query: query.map(|Query(query)| query).unwrap_or_default(),
        params: params
            .map(|Path(params)| params.into_iter().collect())
            .unwrap_or_default(),
    }
}

/// Handler for every registered read route.
///
/// The route configuration travels as a request extension attached at
/// registration.
pub async fn content_handler(
    State(state): State<AppState>,
    Extension(route): Extension<Arc<RouteConfig>>,
    params: Option<Path<HashMap<String, String>>>,
    query: Option<Query<BTreeMap<String, String>>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let request = inbound(method, &uri, params, query);

    match state.pipeline.run(&route, request).await {
        Ok(rendered) => content_response(rendered, state.freshness),
        Err(err) => state.responder.respond(&err, accepts_html(&headers)).await,
    }
}

fn content_response(rendered: Rendered, freshness: Duration) -> Response {
    let mut response = Html(rendered.body).into_response();
    let headers = response.headers_mut();

    // Only pages backed by the route cache advertise a freshness window
    if rendered.cache != CacheStatus::Bypass {
        let max_age = freshness.as_secs();
        let expires = chrono::Duration::from_std(freshness)
            .ok()
            .and_then(|window| Utc::now().checked_add_signed(window))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        if let Ok(value) = HeaderValue::from_str(&format!("public, max-age={}", max_age)) {
            headers.insert(header::CACHE_CONTROL, value);
        }
        if let Ok(value) =
            HeaderValue::from_str(&expires.format("%a, %d %b %Y %H:%M:%S GMT").to_string())
        {
            headers.insert(header::EXPIRES, value);
        }
    }

    headers.insert("x-cache", HeaderValue::from_static(rendered.cache.as_str()));
    if let Some(key) = rendered.key {
        if let Ok(value) = HeaderValue::from_str(key.as_str()) {
            headers.insert("x-cache-key", value);
        }
    }
    response
}

// == Invalidation ==
/// The raw key named by the `key` route parameter.
fn key_param(params: &BTreeMap<String, String>) -> Result<String, PipelineError> {
    params
        .get(KEY_PARAM)
        .filter(|key| !key.is_empty())
        .cloned()
        .ok_or_else(|| ConfigError("invalidation route has no target key".into()).into())
}

/// Key an invalidation request targets.
///
/// On a content route it is the key a GET of the same URL reads; on a bare
/// invalidation route it is the `key` parameter itself.
fn target_key(
    state: &AppState,
    route: Option<&RouteConfig>,
    request: InboundRequest,
) -> Result<String, PipelineError> {
    let Some(route) = route else {
        return key_param(&request.params);
    };

    state
        .pipeline
        .cache_key(route, request)?
        .map(|key| key.to_string())
        .ok_or_else(|| ConfigError(format!("route {} is never cached", route.pattern)).into())
}

async fn reseed(state: &AppState, target: String, body: &[u8]) -> Result<u64, PipelineError> {
    let body: ReseedBody = if body.is_empty() {
        ReseedBody::default()
    } else {
        serde_json::from_slice(body)
            .map_err(|e| ConfigError(format!("invalid invalidation body: {}", e)))?
    };

    let request = InvalidationRequest::new([target]).with_reseed_pairs(body.into_pairs());
    state.invalidator.evict_and_reseed(&request).await
}

/// Handler for POST on invalidation routes.
///
/// Evicts the target key, then stores every `_keys` pair from the body.
#[allow(clippy::too_many_arguments)]
pub async fn reseed_handler(
    State(state): State<AppState>,
    route: Option<Extension<Arc<RouteConfig>>>,
    params: Option<Path<HashMap<String, String>>>,
    query: Option<Query<BTreeMap<String, String>>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = inbound(method, &uri, params, query);
    let route = route.map(|Extension(route)| route);

    let result = match target_key(&state, route.as_deref(), request) {
        Ok(target) => reseed(&state, target, &body).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(_) => Json(StatusAck::ok()).into_response(),
        Err(err) => state.responder.respond(&err, accepts_html(&headers)).await,
    }
}

/// Handler for DELETE on invalidation routes.
pub async fn evict_handler(
    State(state): State<AppState>,
    route: Option<Extension<Arc<RouteConfig>>>,
    params: Option<Path<HashMap<String, String>>>,
    query: Option<Query<BTreeMap<String, String>>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let request = inbound(method, &uri, params, query);
    let route = route.map(|Extension(route)| route);

    let result = match target_key(&state, route.as_deref(), request) {
        Ok(target) => {
            state
                .invalidator
                .evict(&InvalidationRequest::new([target]))
                .await
        }
        Err(err) => Err(err),
    };

    match result {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => state.responder.respond(&err, accepts_html(&headers)).await,
    }
}

// == Not Found ==
/// Fallback when neither a route nor a static asset matches.
pub async fn not_found_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    state
        .responder
        .respond_status(
            StatusCode::NOT_FOUND,
            "no content at this path",
            accepts_html(&headers),
        )
        .await
}
