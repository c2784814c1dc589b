//! HTTP-shaped request and response values exchanged with the host and origin.
//!
//! These are deliberately transport-agnostic: the engine never sees a socket,
//! only a method, an absolute URL, and a response with status, headers, and
//! body bytes.

use bytes::Bytes;
use url::Url;

/// An inbound request as seen by the fetch hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundRequest {
    pub method: String,
    pub url: Url,
}

impl InboundRequest {
    pub fn new(method: impl Into<String>, url: Url) -> Self {
        Self { method: method.into(), url }
    }

    /// Shorthand for a `GET` request.
    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }
}

/// A complete response: status line, ordered headers, and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    /// Header names are stored lowercased; order is preserved.
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, status_text: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self { status, status_text: status_text.into(), headers: Vec::new(), body: body.into() }
    }

    /// Add a header, replacing any existing value with the same name.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        let name = name.to_ascii_lowercase();
        self.headers.retain(|(n, _)| *n != name);
        self.headers.push((name, value.into()));
    }

    pub fn remove_header(&mut self, name: &str) {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Status in the 2xx range; only these responses are ever cached.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Empty 404 returned when a cache-first asset cannot be obtained.
    pub fn not_found() -> Self {
        Self::new(404, "Not Found", Bytes::new())
    }

    /// 503 returned for a page that is neither reachable nor cached.
    pub fn page_unavailable() -> Self {
        Self::new(503, "Service Unavailable", "Page not available offline")
            .with_header("content-type", "text/plain; charset=utf-8")
    }

    /// 503 returned for an API call that is neither reachable nor cached.
    pub fn api_unavailable() -> Self {
        Self::new(503, "Service Unavailable", r#"{"error":"Content not available offline"}"#)
            .with_header("content-type", "application/json")
    }
}
