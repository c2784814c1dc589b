//! Seam between the engine and whatever talks to the origin.

use async_trait::async_trait;
use url::Url;

use crate::Error;
use crate::http::HttpResponse;

/// How a fetch should treat intermediate HTTP caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    /// Ordinary request.
    #[default]
    Default,
    /// Bypass intermediate caches so the origin answers directly.
    Reload,
}

/// A single network round trip.
///
/// Implementations return `Ok` for every response the origin produced,
/// including 4xx/5xx, and `Err` only when no response was obtained. The
/// engine applies its own timeout on top of whatever the implementation does.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &Url, mode: FetchMode) -> Result<HttpResponse, Error>;
}
