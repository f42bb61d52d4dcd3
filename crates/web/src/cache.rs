//! Interval-expiring page cache.
//!
//! Rendered responses are memoized per canonical request signature and
//! viewer for a fixed interval. Writes never invalidate entries; a stale page
//! is served until it expires or [`PageCache::clear`] is called.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Method, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use lru::LruCache;
use tokio::time::Instant;
use tracing::{debug, warn};
use url::form_urlencoded;
use yatube_db::entities::user;

/// Largest body that is buffered for caching.
const MAX_CACHED_BODY: usize = 4 * 1024 * 1024;

/// Who a cached page was rendered for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Viewer {
    /// Not logged in.
    Anonymous,
    /// A logged-in user, by id.
    User(String),
}

impl Viewer {
    /// Partition of a request, from the identity the auth middleware stored.
    #[must_use]
    pub fn of<B>(request: &Request<B>) -> Self {
        request
            .extensions()
            .get::<user::Model>()
            .map_or(Self::Anonymous, |user| Self::User(user.id.clone()))
    }
}

/// Cache key: canonical request signature plus viewer partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    signature: String,
    viewer: Viewer,
}

impl CacheKey {
    /// Key for a request path and raw query string.
    #[must_use]
    pub fn new(path: &str, query: Option<&str>, viewer: Viewer) -> Self {
        Self {
            signature: canonical_signature(path, query),
            viewer,
        }
    }

    /// Canonical request signature.
    #[must_use]
    pub fn signature(&self) -> &str {
        &self.signature
    }
}

/// Path plus query parameters sorted by name, then value.
///
/// `/?b=2&a=1` and `/?a=1&b=2` share a signature.
#[must_use]
pub fn canonical_signature(path: &str, query: Option<&str>) -> String {
    let mut pairs: Vec<(String, String)> = form_urlencoded::parse(query.unwrap_or("").as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if pairs.is_empty() {
        return path.to_string();
    }
    pairs.sort();

    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish();
    format!("{path}?{query}")
}

/// A stored response.
#[derive(Debug, Clone)]
pub struct CachedPage {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    stored_at: Instant,
}

impl CachedPage {
    fn new(status: StatusCode, headers: &HeaderMap, body: Bytes) -> Self {
        let mut headers = headers.clone();
        // a stored page must never hand one visitor's cookie to another
        headers.remove(header::SET_COOKIE);
        Self {
            status,
            headers,
            body,
            stored_at: Instant::now(),
        }
    }

    /// Stored body bytes.
    #[must_use]
    pub const fn body(&self) -> &Bytes {
        &self.body
    }
}

impl IntoResponse for CachedPage {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

struct Inner {
    ttl: Duration,
    entries: Mutex<LruCache<CacheKey, CachedPage>>,
}

/// Shared handle to the page cache.
#[derive(Clone)]
pub struct PageCache {
    inner: Arc<Inner>,
}

impl PageCache {
    /// Create a cache holding at most `capacity` pages for `ttl` each.
    #[must_use]
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(Inner {
                ttl,
                entries: Mutex::new(LruCache::new(capacity)),
            }),
        }
    }

    /// How long a page stays fresh.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    fn lock(&self, op: &'static str) -> MutexGuard<'_, LruCache<CacheKey, CachedPage>> {
        match self.inner.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!(
                    op,
                    lock_kind = "mutex.lock",
                    result = "poisoned_recovered",
                    "Recovered from poisoned page cache lock"
                );
                poisoned.into_inner()
            }
        }
    }

    /// Fresh page stored under `key`. Expired entries are dropped on sight.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<CachedPage> {
        let mut entries = self.lock("get");
        let expired = entries
            .peek(key)
            .map(|page| page.stored_at.elapsed() >= self.inner.ttl)?;
        if expired {
            entries.pop(key);
            return None;
        }
        entries.get(key).cloned()
    }

    /// Store a page; a later writer for the same key wins.
    pub fn put(&self, key: CacheKey, page: CachedPage) {
        self.lock("put").put(key, page);
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.lock("clear").clear();
        debug!("Page cache cleared");
    }

    /// Number of stored entries, fresh or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock("len").len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Middleware serving and storing `200 OK` GET responses of the wrapped routes.
pub async fn page_cache_layer(
    State(cache): State<PageCache>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() != Method::GET {
        return next.run(request).await;
    }

    let key = CacheKey::new(
        request.uri().path(),
        request.uri().query(),
        Viewer::of(&request),
    );

    if let Some(page) = cache.get(&key) {
        debug!(cache = "page", outcome = "hit", signature = key.signature(), "Serving cached page");
        return page.into_response();
    }

    debug!(cache = "page", outcome = "miss", signature = key.signature(), "Rendering page");
    let response = next.run(request).await;
    if response.status() != StatusCode::OK {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_CACHED_BODY).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "Failed to buffer page for caching");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    cache.put(key, CachedPage::new(parts.status, &parts.headers, bytes.clone()));
    Response::from_parts(parts, Body::from(bytes))
}
