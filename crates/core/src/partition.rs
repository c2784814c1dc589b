//! Cache partitions and their fixed strategy table.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::TtlConfig;

/// The four cache regions a request can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionKind {
    Static,
    Api,
    Image,
    Page,
}

impl PartitionKind {
    pub const ALL: [PartitionKind; 4] = [PartitionKind::Static, PartitionKind::Api, PartitionKind::Image, PartitionKind::Page];

    pub fn as_str(&self) -> &'static str {
        match self {
            PartitionKind::Static => "static",
            PartitionKind::Api => "api",
            PartitionKind::Image => "image",
            PartitionKind::Page => "page",
        }
    }

    /// Strategy each kind is served with. Not configurable.
    pub fn strategy(&self) -> Strategy {
        match self {
            PartitionKind::Static | PartitionKind::Image => Strategy::CacheFirst,
            PartitionKind::Page => Strategy::NetworkFirst,
            PartitionKind::Api => Strategy::StaleWhileRevalidate,
        }
    }
}

impl fmt::Display for PartitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    CacheFirst,
    NetworkFirst,
    StaleWhileRevalidate,
}

/// A named cache region and how it is served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub kind: PartitionKind,
    /// `<version>-<kind>`, e.g. `v1-static`.
    pub name: String,
    /// `0` means never fresh.
    pub ttl_ms: u64,
    pub strategy: Strategy,
}

/// The four partitions of one cache version, built once at startup.
#[derive(Debug, Clone)]
pub struct PartitionTable {
    version: String,
    partitions: [Partition; 4],
}

impl PartitionTable {
    pub fn new(version: &str, ttl: &TtlConfig) -> Self {
        let make = |kind: PartitionKind, ttl_ms: u64| Partition {
            kind,
            name: format!("{version}-{kind}"),
            ttl_ms,
            strategy: kind.strategy(),
        };

        Self {
            version: version.to_string(),
            partitions: [
                make(PartitionKind::Static, ttl.static_ms),
                make(PartitionKind::Api, ttl.api_ms),
                make(PartitionKind::Image, ttl.image_ms),
                make(PartitionKind::Page, ttl.page_ms),
            ],
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn get(&self, kind: PartitionKind) -> &Partition {
        match kind {
            PartitionKind::Static => &self.partitions[0],
            PartitionKind::Api => &self.partitions[1],
            PartitionKind::Image => &self.partitions[2],
            PartitionKind::Page => &self.partitions[3],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Partition> {
        self.partitions.iter()
    }

    /// Names every partition of the current version; anything else persisted is orphaned.
    pub fn expected_names(&self) -> Vec<String> {
        self.partitions.iter().map(|p| p.name.clone()).collect()
    }

    pub fn is_expected(&self, name: &str) -> bool {
        self.partitions.iter().any(|p| p.name == name)
    }
}
