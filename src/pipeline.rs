//! Request pipeline orchestrator.
//!
//! One request runs `Resolving → CacheLookup → {CacheHit | CacheMiss →
//! Fetching → Caching} → Shaping → Rendering → Responding`. Each stage is an
//! awaited fallible step; the first error ends the run and no later stage
//! executes.
//!
//! Two failures are absorbed instead of propagated: a cache read error reads
//! as a miss, and a cache write error after a successful fetch is only
//! logged. The client already has, or is about to get, a correct answer from
//! upstream in both cases.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::cache::{CacheBackend, CacheKey};
use crate::error::Result;
use crate::render::TemplateEngine;
use crate::resource::{resolve, InboundRequest, RequestDescriptor, RouteConfig, UpstreamTarget};
use crate::shape::{shape, ViewModel};
use crate::upstream::Fetcher;

// == Stage ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolving,
    CacheLookup,
    CacheHit,
    CacheMiss,
    Fetching,
    Caching,
    Shaping,
    Rendering,
    Responding,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Resolving => "resolving",
            Stage::CacheLookup => "cache_lookup",
            Stage::CacheHit => "cache_hit",
            Stage::CacheMiss => "cache_miss",
            Stage::Fetching => "fetching",
            Stage::Caching => "caching",
            Stage::Shaping => "shaping",
            Stage::Rendering => "rendering",
            Stage::Responding => "responding",
        };
        f.write_str(name)
    }
}

// == Cache Status ==
/// How the payload for a response was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
    /// Static resources never touch the store
    Bypass,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
            CacheStatus::Bypass => "BYPASS",
        }
    }
}

/// A successfully rendered response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub body: String,
    pub cache: CacheStatus,
    pub key: Option<CacheKey>,
}

// == Pipeline ==
/// Composes resolver, store, fetcher, shaper and renderer.
///
/// Shared by every request; holds no per-request state.
pub struct Pipeline {
    cache: Arc<dyn CacheBackend>,
    fetcher: Arc<dyn Fetcher>,
    engine: Arc<dyn TemplateEngine>,
    api_base: String,
    ttl: Duration,
}

impl Pipeline {
    pub fn new(
        cache: Arc<dyn CacheBackend>,
        fetcher: Arc<dyn Fetcher>,
        engine: Arc<dyn TemplateEngine>,
        api_base: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            cache,
            fetcher,
            engine,
            api_base: api_base.into(),
            ttl,
        }
    }

    pub fn cache(&self) -> Arc<dyn CacheBackend> {
        Arc::clone(&self.cache)
    }

    pub fn engine(&self) -> Arc<dyn TemplateEngine> {
        Arc::clone(&self.engine)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Key a GET of `request` on `route` reads and writes.
    ///
    /// `None` for routes that never touch the cache.
    pub fn cache_key(&self, route: &RouteConfig, request: InboundRequest) -> Result<Option<CacheKey>> {
        let descriptor = resolve(route, &self.api_base, request)?;
        Ok(CacheKey::for_descriptor(&descriptor))
    }

    /// Serves one request for `route`.
    pub async fn run(&self, route: &RouteConfig, request: InboundRequest) -> Result<Rendered> {
        let path = request.path.clone();
        let result = self.execute(route, request).await;
        if let Err(err) = &result {
            error!(path = %path, status = err.status().as_u16(), error = %err, "Pipeline failed");
        }
        result
    }

    async fn execute(&self, route: &RouteConfig, request: InboundRequest) -> Result<Rendered> {
        debug!(stage = %Stage::Resolving, path = %request.path, kind = %route.kind());
        let descriptor = resolve(route, &self.api_base, request)?;

        if let UpstreamTarget::Static { resource } = &descriptor.target {
            debug!(stage = %Stage::Rendering, resource = %resource, "Rendering static resource");
            let view = ViewModel::Static {
                resource: resource.clone(),
            };
            let body = self.engine.render(&descriptor.template, &view).await?;
            debug!(stage = %Stage::Responding);
            return Ok(Rendered {
                body,
                cache: CacheStatus::Bypass,
                key: None,
            });
        }

        let key = CacheKey::for_descriptor(&descriptor);
        let (raw, cache) = match &key {
            Some(key) => self.read_through(key, &descriptor).await?,
            None => (self.fetcher.fetch(&descriptor).await?, CacheStatus::Bypass),
        };

        debug!(stage = %Stage::Shaping, kind = %descriptor.kind);
        let view = shape(descriptor.kind, &raw)?;

        debug!(stage = %Stage::Rendering, template = %descriptor.template);
        let body = self.engine.render(&descriptor.template, &view).await?;

        debug!(stage = %Stage::Responding, cache = cache.as_str());
        Ok(Rendered { body, cache, key })
    }

    /// Cache lookup, falling back to fetch-then-store on a miss.
    ///
    /// `set` runs exactly once per successful fetch and never on a hit or a
    /// failed fetch.
    async fn read_through(
        &self,
        key: &CacheKey,
        descriptor: &RequestDescriptor,
    ) -> Result<(String, CacheStatus)> {
        debug!(stage = %Stage::CacheLookup, key = %key);
        match self.cache.get(key.as_str()).await {
            Ok(Some(raw)) => {
                debug!(stage = %Stage::CacheHit, key = %key);
                return Ok((raw, CacheStatus::Hit));
            }
            Ok(None) => {}
            Err(err) => warn!(key = %key, error = %err, "Cache read failed, treating as miss"),
        }

        debug!(stage = %Stage::CacheMiss, key = %key);
        debug!(stage = %Stage::Fetching, target = ?descriptor.target);
        let raw = self.fetcher.fetch(descriptor).await?;

        debug!(stage = %Stage::Caching, key = %key, ttl_secs = self.ttl.as_secs());
        if let Err(err) = self.cache.set(key.as_str(), &raw, self.ttl).await {
            warn!(key = %key, error = %err, "Cache write failed, response unaffected");
        }

        Ok((raw, CacheStatus::Miss))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cache::MemoryBackend;
    use crate::error::{PipelineError, StoreError, UpstreamError};
    use crate::render::SiteTemplates;
    use crate::resource::RouteOptions;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Serves canned payloads per upstream path and counts calls.
    #[derive(Default)]
    pub(crate) struct StubFetcher {
        pub payloads: HashMap<String, std::result::Result<String, UpstreamError>>,
        pub calls: Mutex<Vec<String>>,
    }

    impl StubFetcher {
        pub fn with(mut self, path: &str, payload: std::result::Result<&str, UpstreamError>) -> Self {
            self.payloads
                .insert(path.to_string(), payload.map(str::to_string));
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Fetcher for StubFetcher {
        async fn fetch(&self, descriptor: &RequestDescriptor) -> std::result::Result<String, UpstreamError> {
            let UpstreamTarget::Path(path) = &descriptor.target else {
                return Err(UpstreamError::transport("stub only serves single paths"));
            };
            self.calls.lock().unwrap().push(path.clone());
            self.payloads
                .get(path)
                .cloned()
                .unwrap_or_else(|| Err(UpstreamError::with_status(404, "not found")))
        }
    }

    /// Memory backend that counts writes and can be switched to fail.
    pub(crate) struct CountingBackend {
        pub inner: MemoryBackend,
        pub sets: AtomicUsize,
        pub fail_reads: bool,
        pub fail_writes: bool,
    }

    impl CountingBackend {
        pub fn new() -> Self {
            Self {
                inner: MemoryBackend::new(100),
                sets: AtomicUsize::new(0),
                fail_reads: false,
                fail_writes: false,
            }
        }
    }

    #[async_trait]
    impl CacheBackend for CountingBackend {
        async fn get(&self, key: &str) -> std::result::Result<Option<String>, StoreError> {
            if self.fail_reads {
                return Err(StoreError::Unavailable("connection refused".into()));
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str, ttl: Duration) -> std::result::Result<(), StoreError> {
            self.sets.fetch_add(1, Ordering::SeqCst);
            if self.fail_writes {
                return Err(StoreError::Timeout(500));
            }
            self.inner.set(key, value, ttl).await
        }

        async fn delete(&self, keys: &[String]) -> std::result::Result<u64, StoreError> {
            self.inner.delete(keys).await
        }
    }

    const ARTICLE: &str = r#"{"nid": 1, "title": "Hello", "body": "<p>world</p>"}"#;

    fn item_route() -> RouteConfig {
        RouteConfig::new("/articles/:id", "item.html", RouteOptions::item("node/{id}")).unwrap()
    }

    fn article_request() -> InboundRequest {
        InboundRequest::get("/articles/1").with_param("id", "1")
    }

    fn pipeline(cache: Arc<CountingBackend>, fetcher: Arc<StubFetcher>) -> Pipeline {
        Pipeline::new(
            cache,
            fetcher,
            Arc::new(SiteTemplates::new()),
            "http://cms/api/",
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn test_miss_fetches_once_and_populates_cache() {
        let cache = Arc::new(CountingBackend::new());
        let fetcher = Arc::new(StubFetcher::default().with("node/1", Ok(ARTICLE)));
        let pipeline = pipeline(cache.clone(), fetcher.clone());

        let rendered = pipeline.run(&item_route(), article_request()).await.unwrap();

        assert_eq!(rendered.cache, CacheStatus::Miss);
        assert_eq!(*fetcher.calls.lock().unwrap(), vec!["node/1".to_string()]);
        assert_eq!(cache.sets.load(Ordering::SeqCst), 1);

        let key = rendered.key.unwrap();
        assert_eq!(cache.inner.get(key.as_str()).await.unwrap().as_deref(), Some(ARTICLE));

        let view = shape(crate::resource::ResourceKind::Item, ARTICLE).unwrap();
        let expected = SiteTemplates::new().render("item.html", &view).await.unwrap();
        assert_eq!(rendered.body, expected);
    }

    #[tokio::test]
    async fn test_hit_never_fetches_or_writes() {
        let cache = Arc::new(CountingBackend::new());
        let fetcher = Arc::new(StubFetcher::default().with("node/1", Ok(ARTICLE)));
        let pipeline = pipeline(cache.clone(), fetcher.clone());

        pipeline.run(&item_route(), article_request()).await.unwrap();
        let second = pipeline.run(&item_route(), article_request()).await.unwrap();

        assert_eq!(second.cache, CacheStatus::Hit);
        assert_eq!(fetcher.call_count(), 1);
        assert_eq!(cache.sets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_skips_cache_write_and_keeps_status() {
        let cache = Arc::new(CountingBackend::new());
        let fetcher = Arc::new(StubFetcher::default());
        let pipeline = pipeline(cache.clone(), fetcher.clone());

        let err = pipeline.run(&item_route(), article_request()).await.unwrap_err();

        assert_eq!(err.status().as_u16(), 404);
        assert_eq!(fetcher.call_count(), 1);
        assert_eq!(cache.sets.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_store_read_failure_degrades_to_fetch() {
        let mut backend = CountingBackend::new();
        backend.fail_reads = true;
        let cache = Arc::new(backend);
        let fetcher = Arc::new(StubFetcher::default().with("node/1", Ok(ARTICLE)));
        let pipeline = pipeline(cache.clone(), fetcher.clone());

        pipeline.run(&item_route(), article_request()).await.unwrap();
        pipeline.run(&item_route(), article_request()).await.unwrap();

        // Every request goes upstream while the store is down
        assert_eq!(fetcher.call_count(), 2);
    }

    #[tokio::test]
    async fn test_store_write_failure_does_not_fail_response() {
        let mut backend = CountingBackend::new();
        backend.fail_writes = true;
        let cache = Arc::new(backend);
        let fetcher = Arc::new(StubFetcher::default().with("node/1", Ok(ARTICLE)));
        let pipeline = pipeline(cache.clone(), fetcher.clone());

        let rendered = pipeline.run(&item_route(), article_request()).await.unwrap();

        assert_eq!(rendered.cache, CacheStatus::Miss);
        assert_eq!(cache.sets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_shape_error_stops_before_render() {
        let cache = Arc::new(CountingBackend::new());
        let fetcher = Arc::new(StubFetcher::default().with("node/1", Ok("[1, 2]")));
        let pipeline = pipeline(cache.clone(), fetcher.clone());

        let err = pipeline.run(&item_route(), article_request()).await.unwrap_err();

        assert!(matches!(err, PipelineError::Shape { .. }));
        assert_eq!(err.status().as_u16(), 500);
        // The raw payload was still cached: the write follows the fetch
        assert_eq!(cache.sets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_static_route_bypasses_store_and_fetcher() {
        let cache = Arc::new(CountingBackend::new());
        let fetcher = Arc::new(StubFetcher::default());
        let pipeline = pipeline(cache.clone(), fetcher.clone());
        let route =
            RouteConfig::new("/about", "static.html", RouteOptions::static_resource("about")).unwrap();

        let rendered = pipeline.run(&route, InboundRequest::get("/about")).await.unwrap();

        assert_eq!(rendered.cache, CacheStatus::Bypass);
        assert!(rendered.key.is_none());
        assert!(rendered.body.contains("http://cms/api/about/"));
        assert_eq!(fetcher.call_count(), 0);
        assert_eq!(cache.sets.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cache_key_matches_key_read_on_get() {
        let cache = Arc::new(CountingBackend::new());
        let fetcher = Arc::new(StubFetcher::default().with("node/1", Ok(ARTICLE)));
        let pipeline = pipeline(cache, fetcher);

        let key = pipeline.cache_key(&item_route(), article_request()).unwrap();
        let rendered = pipeline.run(&item_route(), article_request()).await.unwrap();
        assert!(key.is_some());
        assert_eq!(key, rendered.key);

        let about = RouteConfig::new("/about", "static.html", RouteOptions::static_resource("about")).unwrap();
        assert_eq!(pipeline.cache_key(&about, InboundRequest::get("/about")).unwrap(), None);
    }

    #[tokio::test]
    async fn test_resolve_failure_touches_nothing() {
        let cache = Arc::new(CountingBackend::new());
        let fetcher = Arc::new(StubFetcher::default());
        let pipeline = pipeline(cache.clone(), fetcher.clone());

        let err = pipeline
            .run(&item_route(), InboundRequest::get("/articles"))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Config(_)));
        assert_eq!(fetcher.call_count(), 0);
    }
}
