//! Core types and the cache orchestration engine for netstash.
//!
//! This crate provides:
//! - Partitioned response store with SQLite backend
//! - Request classification and freshness rules
//! - The engine: serving strategies, revalidation, lifecycle, control channel
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod freshness;
pub mod http;
pub mod partition;
pub mod urls;

pub use cache::{CacheDb, CacheKey, CachedEntry, PartitionStore};
pub use classify::Classifier;
pub use config::{AppConfig, ConfigError};
pub use engine::{CacheHooks, Engine, EngineSettings, Fetch, FetchMode};
pub use error::Error;
pub use http::{HttpResponse, InboundRequest};
pub use partition::{Partition, PartitionKind, PartitionTable, Strategy};
