//! Stored responses and the synthetic `stored-at` stamp.

use crate::http::HttpResponse;

/// Header injected at write time; the only input to freshness checks.
pub const STORED_AT_HEADER: &str = "stored-at";

/// A response as persisted in a partition.
///
/// The wrapped response always carries [`STORED_AT_HEADER`]. Callers get the
/// response back through [`CachedEntry::to_response`], which strips it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEntry {
    response: HttpResponse,
}

impl CachedEntry {
    /// Clone `response` and stamp it with `now_ms`.
    pub fn stamp(response: &HttpResponse, now_ms: i64) -> Self {
        let mut response = response.clone();
        response.set_header(STORED_AT_HEADER, now_ms.to_string());
        Self { response }
    }

    /// Rehydrate an entry read back from the store as-is.
    pub(crate) fn from_stored(response: HttpResponse) -> Self {
        Self { response }
    }

    /// Epoch milliseconds of the write. Missing or unparsable reads as `0`.
    pub fn stored_at(&self) -> i64 {
        self.response
            .header(STORED_AT_HEADER)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    /// The stored response, including the synthetic header.
    pub fn stored(&self) -> &HttpResponse {
        &self.response
    }

    /// The response to hand to a caller, without the synthetic header.
    pub fn to_response(&self) -> HttpResponse {
        let mut response = self.response.clone();
        response.remove_header(STORED_AT_HEADER);
        response
    }
}
