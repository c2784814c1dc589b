//! Cache key normalization and content-addressed digests.

use sha2::{Digest, Sha256};
use url::Url;

use crate::http::InboundRequest;

/// Identity of a cached item: normalized absolute URL plus method.
///
/// Headers never participate, so two requests for the same URL collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    method: String,
    url: Url,
}

impl CacheKey {
    /// Build a `GET` key for a URL, dropping the fragment.
    pub fn get(url: &Url) -> Self {
        Self::new("GET", url)
    }

    pub fn new(method: &str, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self { method: method.to_ascii_uppercase(), url }
    }

    pub fn from_request(request: &InboundRequest) -> Self {
        Self::new(&request.method, &request.url)
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Hex SHA-256 of `method \n url`, used as the row key.
    pub fn digest(&self) -> String {
        compute_cache_key(&self.method, self.url.as_str())
    }
}

/// Compute the content-addressed row key for a method and absolute URL.
pub fn compute_cache_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
