//! Cache-first GET interceptor.
//!
//! Serves GET requests for the application origin from a durable on-disk
//! cache, consulting the network only on a miss and storing every received
//! response. Requests to other origins pass straight through uncached so
//! third-party API responses (e.g. Notion's) are never poisoned. The cache
//! bucket is named by a single version token; bumping the token on deploy is
//! the only invalidation mechanism.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{FamCalError, FamCalResult};

/// Bump when making breaking cache changes.
pub const CACHE_VERSION: &str = "famcal-v3";

/// Response returned by the interceptor. For application-origin traffic this
/// always resolves; network failure synthesizes a 503, an unexpected handler
/// fault a 500.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResponse {
    pub status: u16,
    pub body: String,
    #[serde(skip)]
    pub from_cache: bool,
}

pub struct CachedFetcher {
    client: reqwest::Client,
    cache_dir: PathBuf,
    app_origin: Option<Url>,
}

impl CachedFetcher {
    pub fn new(cache_root: impl AsRef<Path>, app_origin: Option<Url>) -> FamCalResult<Self> {
        Self::with_version(cache_root, CACHE_VERSION, app_origin)
    }

    pub fn with_version(
        cache_root: impl AsRef<Path>,
        version: &str,
        app_origin: Option<Url>,
    ) -> FamCalResult<Self> {
        let cache_dir = cache_root.as_ref().join(version);
        std::fs::create_dir_all(&cache_dir)?;

        let client = reqwest::Client::builder()
            .user_agent("famcal/0.1")
            .build()
            .map_err(|e| FamCalError::Fetch(e.to_string()))?;

        Ok(CachedFetcher {
            client,
            cache_dir,
            app_origin,
        })
    }

    /// Fetch a URL with cache-first semantics.
    ///
    /// Application-origin GETs never error: the result is the cached entry,
    /// the network response, or a synthesized 503/500. Other origins pass
    /// through uncached and propagate transport failures to the caller.
    pub async fn get(&self, url: &str) -> FamCalResult<CachedResponse> {
        self.get_with_headers(url, &[]).await
    }

    /// Like [`get`](Self::get), with extra request headers (e.g. `Accept`
    /// for calendar feeds). Headers do not participate in the cache key.
    pub async fn get_with_headers(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> FamCalResult<CachedResponse> {
        let parsed = Url::parse(url).map_err(|e| FamCalError::Fetch(e.to_string()))?;

        let intercepted = self
            .app_origin
            .as_ref()
            .is_some_and(|origin| origin.origin() == parsed.origin());

        if !intercepted {
            let mut request = self.client.get(parsed);
            for (name, value) in headers {
                request = request.header(*name, *value);
            }
            let response = request
                .send()
                .await
                .map_err(|e| FamCalError::Fetch(e.to_string()))?;
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| FamCalError::Fetch(e.to_string()))?;
            return Ok(CachedResponse {
                status,
                body,
                from_cache: false,
            });
        }

        match self.cached_or_network(&parsed, headers).await {
            Ok(response) => Ok(response),
            Err(e) => {
                tracing::error!(url, error = %e, "fetch handler fault");
                Ok(CachedResponse {
                    status: 500,
                    body: "Fetch Handler Error".to_string(),
                    from_cache: false,
                })
            }
        }
    }

    async fn cached_or_network(
        &self,
        url: &Url,
        headers: &[(&str, &str)],
    ) -> FamCalResult<CachedResponse> {
        let entry_path = self.entry_path(url);

        if let Some(cached) = read_entry(&entry_path) {
            return Ok(CachedResponse {
                status: cached.status,
                body: cached.body,
                from_cache: true,
            });
        }

        let mut request = self.client.get(url.clone());
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let body = response
                    .text()
                    .await
                    .map_err(|e| FamCalError::Fetch(e.to_string()))?;

                write_entry(&entry_path, &CachedResponse {
                    status,
                    body: body.clone(),
                    from_cache: false,
                });

                Ok(CachedResponse {
                    status,
                    body,
                    from_cache: false,
                })
            }
            Err(e) => {
                tracing::error!(url = %url, error = %e, "fetch failed, serving offline response");
                Ok(CachedResponse {
                    status: 503,
                    body: "Offline".to_string(),
                    from_cache: false,
                })
            }
        }
    }

    fn entry_path(&self, url: &Url) -> PathBuf {
        let key = hex::encode(blake3::hash(url.as_str().as_bytes()).as_bytes());
        self.cache_dir.join(key)
    }
}

fn read_entry(path: &Path) -> Option<CachedResponse> {
    let content = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}

// Cache writes are best-effort: a failed write degrades to plain fetching.
fn write_entry(path: &Path, response: &CachedResponse) {
    match serde_json::to_vec(response) {
        Ok(bytes) => {
            if let Err(e) = std::fs::write(path, bytes) {
                tracing::warn!(path = %path.display(), error = %e, "cache write failed");
            }
        }
        Err(e) => tracing::warn!(error = %e, "cache entry serialization failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_cache_hit_skips_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let origin = Url::parse(&server.uri()).unwrap();
        let fetcher = CachedFetcher::new(dir.path(), Some(origin)).unwrap();

        let url = format!("{}/index.html", server.uri());
        let first = fetcher.get(&url).await.unwrap();
        assert!(!first.from_cache);
        assert_eq!(first.body, "hello");

        let second = fetcher.get(&url).await.unwrap();
        assert!(second.from_cache);
        assert_eq!(second.body, "hello");

        // Exactly one network request; the second response came from cache.
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
    }

    #[tokio::test]
    async fn test_offline_resolves_to_503() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener); // release the port so requests fail with ECONNREFUSED

        let dir = tempfile::tempdir().unwrap();
        let origin = Url::parse(&format!("http://{}", addr)).unwrap();
        let fetcher = CachedFetcher::new(dir.path(), Some(origin.clone())).unwrap();

        let response = fetcher
            .get(&format!("http://{}/page", addr))
            .await
            .expect("offline must resolve, not reject");
        assert_eq!(response.status, 503);
        assert_eq!(response.body, "Offline");
    }

    #[tokio::test]
    async fn test_cross_origin_is_not_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("api"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        // App origin differs from the server, so requests pass through.
        let origin = Url::parse("https://calendar.example.org").unwrap();
        let fetcher = CachedFetcher::new(dir.path(), Some(origin)).unwrap();

        let url = format!("{}/v1/data", server.uri());
        fetcher.get(&url).await.unwrap();
        fetcher.get(&url).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
    }

    #[tokio::test]
    async fn test_version_bump_invalidates_entries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("v"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let origin = Url::parse(&server.uri()).unwrap();
        let url = format!("{}/app.js", server.uri());

        let old = CachedFetcher::with_version(dir.path(), "famcal-v3", Some(origin.clone())).unwrap();
        old.get(&url).await.unwrap();

        let new = CachedFetcher::with_version(dir.path(), "famcal-v4", Some(origin)).unwrap();
        let response = new.get(&url).await.unwrap();
        assert!(!response.from_cache);

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
    }
}
