//! Resource configuration and request resolution.
//!
//! A route is registered with a [`RouteOptions`] variant per resource kind.
//! The options are checked once at registration ([`RouteConfig::new`]); at
//! request time [`resolve`] turns the route plus the inbound request into an
//! immutable [`RequestDescriptor`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use axum::http::Method;

use crate::error::ConfigError;

// == Resource Kind ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// A single upstream document
    Item,
    /// A collection or section listing
    List,
    /// Several upstream documents aggregated under names
    Multi,
    /// Rendered from a fixed resource, bypassing cache and upstream
    Static,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Item => "item",
            ResourceKind::List => "list",
            ResourceKind::Multi => "multi",
            ResourceKind::Static => "static",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Route Options ==
/// One upstream source of a multi route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedSource {
    pub name: String,
    pub path: String,
}

/// Per-kind route configuration.
///
/// Upstream paths are templates: `{name}` is replaced by the route's path
/// parameter of the same name. `query` names the inbound query parameters
/// that are forwarded upstream and distinguish cache entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOptions {
    Item { upstream: String, query: Vec<String> },
    List { upstream: String, query: Vec<String> },
    Multi { sources: Vec<NamedSource>, query: Vec<String> },
    Static { resource: String },
}

impl RouteOptions {
    pub fn item(upstream: impl Into<String>) -> Self {
        RouteOptions::Item {
            upstream: upstream.into(),
            query: Vec::new(),
        }
    }

    /// List route forwarding the `page` query parameter.
    pub fn list(upstream: impl Into<String>) -> Self {
        RouteOptions::List {
            upstream: upstream.into(),
            query: vec!["page".to_string()],
        }
    }

    pub fn multi<N, P>(sources: impl IntoIterator<Item = (N, P)>) -> Self
    where
        N: Into<String>,
        P: Into<String>,
    {
        RouteOptions::Multi {
            sources: sources
                .into_iter()
                .map(|(name, path)| NamedSource {
                    name: name.into(),
                    path: path.into(),
                })
                .collect(),
            query: Vec::new(),
        }
    }

    pub fn static_resource(resource: impl Into<String>) -> Self {
        RouteOptions::Static {
            resource: resource.into(),
        }
    }

    /// Replaces the forwarded query parameter names. No-op for static routes.
    pub fn with_query<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        match &mut self {
            RouteOptions::Item { query, .. }
            | RouteOptions::List { query, .. }
            | RouteOptions::Multi { query, .. } => *query = names,
            RouteOptions::Static { .. } => {}
        }
        self
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            RouteOptions::Item { .. } => ResourceKind::Item,
            RouteOptions::List { .. } => ResourceKind::List,
            RouteOptions::Multi { .. } => ResourceKind::Multi,
            RouteOptions::Static { .. } => ResourceKind::Static,
        }
    }

    fn query_names(&self) -> &[String] {
        match self {
            RouteOptions::Item { query, .. }
            | RouteOptions::List { query, .. }
            | RouteOptions::Multi { query, .. } => query,
            RouteOptions::Static { .. } => &[],
        }
    }
}

// == Route Config ==
/// A validated route: pattern, template and options.
#[derive(Debug, Clone)]
pub struct RouteConfig {
    pub pattern: String,
    pub template: String,
    pub options: RouteOptions,
}

impl RouteConfig {
    /// Validates the options against the route pattern.
    ///
    /// Every `{placeholder}` in an upstream path must be captured by the
    /// pattern (`:name` or `*name`), and multi routes need at least one
    /// source with unique names.
    pub fn new(
        pattern: impl Into<String>,
        template: impl Into<String>,
        options: RouteOptions,
    ) -> Result<Self, ConfigError> {
        let pattern = pattern.into();
        let template = template.into();

        if template.is_empty() {
            return Err(ConfigError(format!("route {pattern} has no template")));
        }

        let captures = pattern_captures(&pattern);
        let upstreams: Vec<&str> = match &options {
            RouteOptions::Item { upstream, .. } | RouteOptions::List { upstream, .. } => {
                vec![upstream.as_str()]
            }
            RouteOptions::Multi { sources, .. } => {
                if sources.is_empty() {
                    return Err(ConfigError(format!("multi route {pattern} has no sources")));
                }
                let mut seen = BTreeSet::new();
                for source in sources {
                    if !seen.insert(source.name.as_str()) {
                        return Err(ConfigError(format!(
                            "multi route {pattern} repeats source `{}`",
                            source.name
                        )));
                    }
                }
                sources.iter().map(|s| s.path.as_str()).collect()
            }
            RouteOptions::Static { resource } => {
                if resource.is_empty() {
                    return Err(ConfigError(format!("static route {pattern} has no resource")));
                }
                Vec::new()
            }
        };

        for upstream in upstreams {
            for name in placeholders(upstream)? {
                if !captures.contains(name) {
                    return Err(ConfigError(format!(
                        "upstream `{upstream}` uses `{{{name}}}` but route {pattern} does not capture it"
                    )));
                }
            }
        }

        Ok(Self {
            pattern,
            template,
            options,
        })
    }

    pub fn kind(&self) -> ResourceKind {
        self.options.kind()
    }
}

/// Names captured by an axum route pattern (`/:id`, `/*rest`).
pub(crate) fn pattern_captures(pattern: &str) -> BTreeSet<&str> {
    pattern
        .split('/')
        .filter_map(|segment| {
            segment
                .strip_prefix(':')
                .or_else(|| segment.strip_prefix('*'))
        })
        .collect()
}

/// `{name}` placeholders in an upstream path template.
fn placeholders(template: &str) -> Result<Vec<&str>, ConfigError> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let end = after
            .find('}')
            .ok_or_else(|| ConfigError(format!("unclosed placeholder in `{template}`")))?;
        let name = &after[..end];
        if name.is_empty() {
            return Err(ConfigError(format!("empty placeholder in `{template}`")));
        }
        names.push(name);
        rest = &after[end + 1..];
    }
    Ok(names)
}

fn fill_placeholders(
    template: &str,
    params: &BTreeMap<String, String>,
) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after
            .find('}')
            .ok_or_else(|| ConfigError(format!("unclosed placeholder in `{template}`")))?;
        let name = &after[..end];
        let value = params
            .get(name)
            .ok_or_else(|| ConfigError(format!("missing path parameter `{name}`")))?;
        out.push_str(value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

// == Inbound Request ==
/// The parts of an HTTP request the pipeline needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundRequest {
    pub method: Method,
    pub path: String,
    pub query: BTreeMap<String, String>,
    pub params: BTreeMap<String, String>,
}

impl InboundRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            query: BTreeMap::new(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }
}

// == Request Descriptor ==
/// Where the content for a request comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamTarget {
    /// Upstream path relative to the API base
    Path(String),
    /// Named upstream paths fetched in order
    Multi(Vec<NamedSource>),
    /// Absolute resource URL handed straight to the renderer
    Static { resource: String },
}

/// Everything later stages need to serve one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub kind: ResourceKind,
    pub template: String,
    pub target: UpstreamTarget,
    /// Content-affecting query parameters, forwarded upstream
    pub query: BTreeMap<String, String>,
    pub request: InboundRequest,
}

// == Resolve ==
/// Builds the descriptor for one request. Pure; performs no I/O.
pub fn resolve(
    route: &RouteConfig,
    api_base: &str,
    request: InboundRequest,
) -> Result<RequestDescriptor, ConfigError> {
    let target = match &route.options {
        RouteOptions::Item { upstream, .. } | RouteOptions::List { upstream, .. } => {
            UpstreamTarget::Path(fill_placeholders(upstream, &request.params)?)
        }
        RouteOptions::Multi { sources, .. } => UpstreamTarget::Multi(
            sources
                .iter()
                .map(|source| -> Result<NamedSource, ConfigError> {
                    Ok(NamedSource {
                        name: source.name.clone(),
                        path: fill_placeholders(&source.path, &request.params)?,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
        ),
        RouteOptions::Static { resource } => UpstreamTarget::Static {
            resource: format!("{}{}/", api_base, resource),
        },
    };

    let query = route
        .options
        .query_names()
        .iter()
        .filter_map(|name| {
            request
                .query
                .get(name)
                .map(|value| (name.clone(), value.clone()))
        })
        .collect();

    Ok(RequestDescriptor {
        kind: route.kind(),
        template: route.template.clone(),
        target,
        query,
        request,
    })
}
