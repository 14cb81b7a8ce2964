use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use authorlink_core::ServiceConfig;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, RETRY_AFTER};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{Result, ScienceError};

/// Longest `Retry-After` we are willing to sleep for a single 429.
const MAX_RETRY_AFTER_SECS: u64 = 60;

// ─── RateLimitedClient ────────────────────────────────────────────────────────

/// HTTP client that paces every request through one shared minimum interval
/// and retries transient failures with exponential backoff.
///
/// Clones share the pacing state, so handing a clone to each task still keeps
/// the whole process under the service's published rate.
#[derive(Clone)]
pub struct RateLimitedClient {
    service: String,
    client: reqwest::Client,
    min_interval: Duration,
    last_request: Arc<Mutex<Option<Instant>>>,
    max_retries: u32,
    backoff_base: Duration,
}

impl RateLimitedClient {
    pub fn new(service: &str, config: &ServiceConfig, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .gzip(true)
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;
        Ok(Self {
            service: service.to_string(),
            client,
            min_interval: Duration::from_millis(config.min_interval_ms),
            last_request: Arc::new(Mutex::new(None)),
            max_retries: config.max_retries,
            backoff_base: Duration::from_millis(config.backoff_base_ms),
        })
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    async fn wait_for_rate_limit(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(t) = *last {
            let elapsed = t.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(2u32.saturating_pow(attempt))
    }

    fn exhausted(&self, attempts: u32, message: String) -> ScienceError {
        ScienceError::TransientService {
            service: self.service.clone(),
            attempts,
            message,
        }
    }

    pub async fn get(&self, url: &str) -> Result<String> {
        self.get_with_headers(url, HeaderMap::new()).await
    }

    /// GET with retries.
    ///
    /// 404 maps to `NotFound`, other 4xx to `ApiError`. Connection errors,
    /// 5xx and 429 are retried `max_retries` times and then surface as
    /// `TransientService`.
    pub async fn get_with_headers(&self, url: &str, headers: HeaderMap) -> Result<String> {
        let mut attempt = 0u32;
        loop {
            self.wait_for_rate_limit().await;
            let resp = self.client.get(url).headers(headers.clone()).send().await;
            match resp {
                Ok(r) if r.status() == StatusCode::TOO_MANY_REQUESTS => {
                    if attempt >= self.max_retries {
                        return Err(self.exhausted(attempt + 1, "HTTP 429".to_string()));
                    }
                    let wait = r
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .map(|secs| Duration::from_secs(secs.min(MAX_RETRY_AFTER_SECS)))
                        .unwrap_or_else(|| self.backoff(attempt));
                    warn!(service = %self.service, ?wait, "rate limited, backing off");
                    sleep(wait).await;
                    attempt += 1;
                }
                Ok(r) if r.status() == StatusCode::NOT_FOUND => {
                    return Err(ScienceError::NotFound(self.service.clone(), url.to_string()));
                }
                Ok(r) if r.status().is_server_error() => {
                    let status = r.status().as_u16();
                    if attempt >= self.max_retries {
                        return Err(self.exhausted(attempt + 1, format!("HTTP {status}")));
                    }
                    debug!(service = %self.service, status, attempt, "server error, retrying");
                    sleep(self.backoff(attempt)).await;
                    attempt += 1;
                }
                Ok(r) if !r.status().is_success() => {
                    let status = r.status().as_u16();
                    let body = r.text().await.unwrap_or_default();
                    return Err(ScienceError::ApiError(
                        self.service.clone(),
                        format!("HTTP {status} for {url}: {body}"),
                    ));
                }
                Ok(r) => return r.text().await.map_err(ScienceError::Http),
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(self.exhausted(attempt + 1, e.to_string()));
                    }
                    debug!(service = %self.service, error = %e, attempt, "request failed, retrying");
                    sleep(self.backoff(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let text = self.get_with_headers(url, headers).await?;
        serde_json::from_str(&text).map_err(|e| ScienceError::Parse(e.to_string()))
    }
}

// ─── DiskCache ────────────────────────────────────────────────────────────────

pub struct DiskCache {
    dir: PathBuf,
    ttl: Duration,
}

fn cache_key_to_path(dir: &Path, key: &str) -> PathBuf {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    let hash = hasher.finish();
    dir.join(format!("{hash:016x}.json"))
}

#[derive(Serialize, serde::Deserialize)]
struct CacheEntry<T> {
    stored_at: u64, // Unix timestamp secs
    value: T,
}

impl DiskCache {
    pub fn new(namespace: &str, ttl: Duration) -> Self {
        let dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("authorlink")
            .join("cache")
            .join(namespace);
        let _ = std::fs::create_dir_all(&dir);
        Self { dir, ttl }
    }

    /// Cache for a service, or `None` when its TTL is zero.
    pub fn for_service(namespace: &str, config: &ServiceConfig) -> Option<Self> {
        (config.cache_ttl_secs > 0)
            .then(|| Self::new(namespace, Duration::from_secs(config.cache_ttl_secs)))
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = cache_key_to_path(&self.dir, key);
        let data = tokio::fs::read(&path).await.ok()?;
        let entry: CacheEntry<T> = serde_json::from_slice(&data).ok()?;
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        if now.saturating_sub(entry.stored_at) > self.ttl.as_secs() {
            let _ = tokio::fs::remove_file(&path).await;
            return None;
        }
        Some(entry.value)
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T) {
        let path = cache_key_to_path(&self.dir, key);
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let entry = CacheEntry {
            stored_at: now,
            value,
        };
        if let Ok(data) = serde_json::to_vec(&entry) {
            let _ = tokio::fs::write(&path, data).await;
        }
    }
}

#[cfg(test)]
pub(crate) fn test_service_config(base_url: &str) -> ServiceConfig {
    ServiceConfig {
        base_url: base_url.to_string(),
        min_interval_ms: 0,
        max_retries: 2,
        backoff_base_ms: 1,
        timeout_secs: 5,
        cache_ttl_secs: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    #[tokio::test]
    async fn cache_set_get_roundtrip() {
        let ttl = Duration::from_secs(60);
        let cache = DiskCache::new("test_roundtrip", ttl);
        cache.set("key1", &"hello world").await;
        let val: Option<String> = cache.get("key1").await;
        assert_eq!(val, Some("hello world".to_string()));
    }

    #[tokio::test]
    async fn cache_expired_returns_none() {
        let ttl = Duration::from_secs(0); // immediate expiry
        let cache = DiskCache::new("test_expired", ttl);
        cache.set("key_exp", &42u32).await;
        // Sleep 1s to ensure TTL passes
        sleep(Duration::from_millis(1100)).await;
        let val: Option<u32> = cache.get("key_exp").await;
        assert_eq!(val, None);
    }

    #[test]
    fn zero_ttl_disables_cache() {
        let config = test_service_config("http://localhost");
        assert!(DiskCache::for_service("test_disabled", &config).is_none());
    }

    #[tokio::test]
    async fn server_errors_are_retried_then_reported_transient() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/flaky")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let client =
            RateLimitedClient::new("test", &test_service_config(&server.url()), "authorlink-test")
                .unwrap();
        let err = client
            .get(&format!("{}/flaky", server.url()))
            .await
            .unwrap_err();

        mock.assert_async().await;
        assert!(err.is_transient());
        match err {
            ScienceError::TransientService { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn not_found_is_not_retried() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let client =
            RateLimitedClient::new("test", &test_service_config(&server.url()), "authorlink-test")
                .unwrap();
        let err = client
            .get(&format!("{}/missing", server.url()))
            .await
            .unwrap_err();

        mock.assert_async().await;
        assert!(err.is_not_found());
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn get_json_sends_accept_header() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/thing")
            .match_header("accept", "application/json")
            .with_status(200)
            .with_body(r#"{"ok": true}"#)
            .create_async()
            .await;

        let client =
            RateLimitedClient::new("test", &test_service_config(&server.url()), "authorlink-test")
                .unwrap();
        let value: serde_json::Value = client
            .get_json(&format!("{}/thing", server.url()))
            .await
            .unwrap();
        assert_eq!(value["ok"], true);
    }
}
