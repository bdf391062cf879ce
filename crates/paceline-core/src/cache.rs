//! Offline cache gateway
//!
//! Every Budget API GET goes through here. Authenticated requests are
//! network-first with a bounded timeout and fall back to the most recent
//! cached response; unauthenticated requests race a slow network against the
//! cache after a short grace period while the network call keeps running in
//! the background to refresh the cache. Transport failures with an empty
//! cache surface as a synthetic 503 rather than an Err, so callers always
//! see an HTTP-shaped response.
//!
//! A losing network call can never overwrite a result already returned to
//! the caller; it only ever warms the cache for the next request.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use sha2::{Digest, Sha256};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::db::{CachedResponse, Database};
use crate::error::Result;

/// Bound on any single network attempt
const NETWORK_TIMEOUT: Duration = Duration::from_secs(10);

/// How long an unauthenticated request waits on the network before racing
/// the cache
const SOFT_RACE_DELAY: Duration = Duration::from_millis(500);

pub const SYNTHETIC_OFFLINE_BODY: &str = r#"{"error":"offline"}"#;
pub const SYNTHETIC_TIMEOUT_BODY: &str = r#"{"error":"timeout"}"#;

/// Where a gateway response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache,
    /// Generated locally when the network failed and the cache was empty
    Synthetic,
}

/// An HTTP-shaped response from the gateway
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub status: u16,
    pub body: String,
    pub source: ResponseSource,
}

impl GatewayResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn from_cache(cached: CachedResponse) -> Self {
        Self {
            status: cached.status,
            body: cached.body,
            source: ResponseSource::Cache,
        }
    }

    fn synthetic(body: &str) -> Self {
        Self {
            status: 503,
            body: body.to_string(),
            source: ResponseSource::Synthetic,
        }
    }
}

/// Request identity for cache keying: SHA-256 of the method + URL (GET only)
pub fn request_key(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"GET ");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

/// Stale-tolerant network/cache policy shared by both execution contexts
#[derive(Clone)]
pub struct CacheGateway {
    http: Client,
    db: Database,
}

impl CacheGateway {
    pub fn new(db: Database) -> Self {
        Self {
            http: Client::new(),
            db,
        }
    }

    /// Fetch a URL under the gateway policy
    ///
    /// `api_key` selects the policy: Some = authenticated network-first,
    /// None = cache race after [`SOFT_RACE_DELAY`].
    pub async fn get(&self, url: &str, api_key: Option<&str>) -> Result<GatewayResponse> {
        match api_key {
            Some(token) => self.network_first(url, token).await,
            None => self.race_cache(url).await,
        }
    }

    async fn network_first(&self, url: &str, token: &str) -> Result<GatewayResponse> {
        let key = request_key(url);
        let request = self.http.get(url).bearer_auth(token);

        match timeout(NETWORK_TIMEOUT, fetch(request)).await {
            Ok(Ok((status, body))) => self.on_network_response(url, &key, status, body),
            Ok(Err(err)) => {
                warn!(url, error = %err, "Network failure, trying cache");
                self.fallback(&key, SYNTHETIC_OFFLINE_BODY)
            }
            Err(_) => {
                warn!(url, "Network attempt timed out, trying cache");
                self.fallback(&key, SYNTHETIC_TIMEOUT_BODY)
            }
        }
    }

    async fn race_cache(&self, url: &str) -> Result<GatewayResponse> {
        let key = request_key(url);

        let http = self.http.clone();
        let db = self.db.clone();
        let task_url = url.to_string();
        let task_key = key.clone();
        let mut handle = tokio::spawn(async move {
            let result = fetch(http.get(&task_url)).await;
            if let Ok((status, body)) = &result {
                if (200..300).contains(status) {
                    // May complete after the caller already got the cached
                    // value; that only refreshes the cache
                    if let Err(err) = db.put_cached_response(&task_key, &task_url, *status, body) {
                        warn!(url = %task_url, error = %err, "Failed to store cached response");
                    }
                }
            }
            result
        });

        tokio::select! {
            joined = &mut handle => {
                return match joined {
                    Ok(Ok((status, body))) => self.on_race_response(&key, status, body),
                    Ok(Err(err)) => {
                        warn!(url, error = %err, "Network failure, trying cache");
                        self.fallback(&key, SYNTHETIC_OFFLINE_BODY)
                    }
                    Err(err) => {
                        warn!(url, error = %err, "Network task failed, trying cache");
                        self.fallback(&key, SYNTHETIC_OFFLINE_BODY)
                    }
                };
            }
            _ = tokio::time::sleep(SOFT_RACE_DELAY) => {}
        }

        // Network still pending after the grace period: prefer a usable
        // cached response and let the task finish in the background
        if let Some(cached) = self.db.get_cached_response(&key)? {
            debug!(url, "Slow network, serving cached response");
            return Ok(GatewayResponse::from_cache(cached));
        }

        match timeout(NETWORK_TIMEOUT, handle).await {
            Ok(Ok(Ok((status, body)))) => self.on_race_response(&key, status, body),
            Ok(Ok(Err(err))) => {
                warn!(url, error = %err, "Network failure, no cache entry");
                self.fallback(&key, SYNTHETIC_OFFLINE_BODY)
            }
            Ok(Err(err)) => {
                warn!(url, error = %err, "Network task failed, no cache entry");
                self.fallback(&key, SYNTHETIC_OFFLINE_BODY)
            }
            Err(_) => {
                warn!(url, "Network attempt timed out, no cache entry");
                self.fallback(&key, SYNTHETIC_TIMEOUT_BODY)
            }
        }
    }

    /// Authenticated-path response handling: cache 2xx, fall back on non-2xx
    fn on_network_response(
        &self,
        url: &str,
        key: &str,
        status: u16,
        body: String,
    ) -> Result<GatewayResponse> {
        if (200..300).contains(&status) {
            self.db.put_cached_response(key, url, status, &body)?;
            return Ok(GatewayResponse {
                status,
                body,
                source: ResponseSource::Network,
            });
        }
        if let Some(cached) = self.db.get_cached_response(key)? {
            debug!(url, status, "Upstream error, serving cached response");
            return Ok(GatewayResponse::from_cache(cached));
        }
        // Non-2xx with no cache entry passes through uncached
        Ok(GatewayResponse {
            status,
            body,
            source: ResponseSource::Network,
        })
    }

    /// Race-path response handling; the spawned task already cached 2xx
    fn on_race_response(&self, key: &str, status: u16, body: String) -> Result<GatewayResponse> {
        if (200..300).contains(&status) {
            return Ok(GatewayResponse {
                status,
                body,
                source: ResponseSource::Network,
            });
        }
        if let Some(cached) = self.db.get_cached_response(key)? {
            return Ok(GatewayResponse::from_cache(cached));
        }
        Ok(GatewayResponse {
            status,
            body,
            source: ResponseSource::Network,
        })
    }

    fn fallback(&self, key: &str, synthetic_body: &str) -> Result<GatewayResponse> {
        if let Some(cached) = self.db.get_cached_response(key)? {
            return Ok(GatewayResponse::from_cache(cached));
        }
        Ok(GatewayResponse::synthetic(synthetic_body))
    }
}

async fn fetch(request: RequestBuilder) -> reqwest::Result<(u16, String)> {
    let response = request.send().await?;
    let status = response.status().as_u16();
    let body = response.text().await?;
    Ok((status, body))
}
