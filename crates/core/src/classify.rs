//! Request classification.
//!
//! Maps a request onto the partition that should serve it, or `None` when the
//! request must pass through untouched. Rules are evaluated in a fixed order
//! and the first match wins:
//!
//! 1. non-GET or non-http(s) => `None`
//! 2. API prefix or API pattern => `Api`
//! 3. image extension => `Image`
//! 4. page prefix, root, or extensionless path => `Page`
//! 5. static prefix or static extension => `Static`
//! 6. anything else => `None`

use regex::Regex;

use crate::config::{ConfigError, RouteConfig};
use crate::http::InboundRequest;
use crate::partition::PartitionKind;

const IMAGE_EXTENSIONS: &str = r"(?i)\.(jpg|jpeg|png|gif|webp|svg)$";
const STATIC_EXTENSIONS: &str = r"(?i)\.(css|js|json|ico)$";

/// Compiled routing rules.
#[derive(Debug, Clone)]
pub struct Classifier {
    api_prefixes: Vec<String>,
    api_patterns: Vec<Regex>,
    page_prefix: String,
    static_prefix: String,
    image_ext: Regex,
    static_ext: Regex,
}

impl Classifier {
    pub fn new(routes: &RouteConfig) -> Result<Self, ConfigError> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| ConfigError::Invalid { field: "routes.api_patterns".into(), reason: e.to_string() })
        };

        Ok(Self {
            api_prefixes: routes.api_prefixes.clone(),
            api_patterns: routes
                .api_patterns
                .iter()
                .map(|p| compile(p.as_str()))
                .collect::<Result<_, _>>()?,
            page_prefix: routes.page_prefix.clone(),
            static_prefix: routes.static_prefix.clone(),
            image_ext: compile(IMAGE_EXTENSIONS)?,
            static_ext: compile(STATIC_EXTENSIONS)?,
        })
    }

    pub fn classify(&self, request: &InboundRequest) -> Option<PartitionKind> {
        if !request.is_get() || !matches!(request.url.scheme(), "http" | "https") {
            return None;
        }

        let path = request.url.path();

        if self.api_prefixes.iter().any(|p| path.starts_with(p.as_str()))
            || self.api_patterns.iter().any(|re| re.is_match(path))
        {
            return Some(PartitionKind::Api);
        }

        if self.image_ext.is_match(path) {
            return Some(PartitionKind::Image);
        }

        if path.starts_with(&self.page_prefix) || path == "/" || !has_extension(path) {
            return Some(PartitionKind::Page);
        }

        if path.starts_with(&self.static_prefix) || self.static_ext.is_match(path) {
            return Some(PartitionKind::Static);
        }

        None
    }
}

fn has_extension(path: &str) -> bool {
    path.rsplit('/').next().is_some_and(|segment| segment.contains('.'))
}
