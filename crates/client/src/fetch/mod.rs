//! HTTP fetch pipeline towards the origin.
//!
//! ### Response handling
//! - Every status is returned as a response; only transport failures are errors
//! - Header names are lowercased, order is preserved
//! - Max body bytes: 5MB (configurable), enforced while streaming
//!
//! ### Limits
//! - Request timeout: 20s (configurable); reported as `FETCH_TIMEOUT`
//! - Max redirects: 5
//!
//! ### Reload mode
//! Install fetches bypass intermediate HTTP caches with
//! `Cache-Control: no-cache` and `Pragma: no-cache`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::BytesMut;
use reqwest::{Client, header};
use url::Url;

use netstash_core::config::AppConfig;
use netstash_core::engine::{Fetch, FetchMode};
use netstash_core::{Error, HttpResponse};

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "netstash/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "netstash/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Self::default()
        }
    }
}

/// reqwest-backed origin client.
#[derive(Debug, Clone)]
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Whether a declared body length is over `max_bytes`. Compared as `u64`
    /// so large lengths are not truncated on 32-bit targets.
    fn exceeds_limit(&self, len: u64) -> bool {
        len > self.config.max_bytes as u64
    }

    async fn get(&self, url: &Url, mode: FetchMode) -> Result<HttpResponse, Error> {
        let start = Instant::now();

        let mut request = self.http.get(url.as_str());
        if mode == FetchMode::Reload {
            request = request
                .header(header::CACHE_CONTROL, "no-cache")
                .header(header::PRAGMA, "no-cache");
        }

        let mut response = request.send().await.map_err(|e| transport_error(url, e))?;

        if let Some(len) = response.content_length()
            && self.exceeds_limit(len)
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect::<Vec<_>>();

        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| transport_error(url, e))? {
            if body.len() + chunk.len() > self.config.max_bytes {
                return Err(Error::FetchTooLarge(format!(
                    "body exceeds {} bytes",
                    self.config.max_bytes
                )));
            }
            body.extend_from_slice(&chunk);
        }

        tracing::debug!(
            "fetched {} -> {} in {}ms ({} bytes)",
            url,
            status.as_u16(),
            start.elapsed().as_millis(),
            body.len()
        );

        Ok(HttpResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body: body.freeze(),
        })
    }
}

fn transport_error(url: &Url, err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::FetchTimeout(format!("{url}: {err}"))
    } else {
        Error::Network(format!("{url}: {err}"))
    }
}

#[async_trait]
impl Fetch for FetchClient {
    async fn fetch(&self, url: &Url, mode: FetchMode) -> Result<HttpResponse, Error> {
        self.get(url, mode).await
    }
}
