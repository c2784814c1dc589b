//! Contracts between the engine and the process hosting it.
//!
//! The host drives the engine through [`CacheHooks`] (install, activate,
//! fetch, message) and the engine calls back into the host through [`Host`]
//! for the two activation shortcuts.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use super::control::ReplyPort;
use super::lifecycle::{ActivationReport, InstallReport};
use crate::Error;
use crate::http::{HttpResponse, InboundRequest};

/// Callbacks the engine makes into its host.
pub trait Host: Send + Sync {
    /// Activate the new version without waiting for old clients to go away.
    fn skip_waiting(&self);

    /// Take control of every existing client immediately.
    fn claim_clients(&self);
}

/// Host that only records what was asked of it.
///
/// Enough for in-process hosts that have no waiting phase of their own.
#[derive(Debug, Default)]
pub struct LocalHost {
    skip_waiting: AtomicBool,
    claimed: AtomicBool,
}

impl LocalHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    pub fn clients_claimed(&self) -> bool {
        self.claimed.load(Ordering::SeqCst)
    }
}

impl Host for LocalHost {
    fn skip_waiting(&self) {
        tracing::info!("skip waiting requested");
        self.skip_waiting.store(true, Ordering::SeqCst);
    }

    fn claim_clients(&self) {
        tracing::info!("claiming clients");
        self.claimed.store(true, Ordering::SeqCst);
    }
}

/// Lifecycle signals a host delivers to the engine.
#[async_trait]
pub trait CacheHooks: Send + Sync {
    /// A new version is being installed.
    async fn on_install(&self) -> Result<InstallReport, Error>;

    /// The installed version became authoritative.
    async fn on_activate(&self) -> Result<ActivationReport, Error>;

    /// A request was intercepted. `None` means pass it through untouched.
    async fn on_fetch(&self, request: &InboundRequest) -> Option<HttpResponse>;

    /// A control message arrived, optionally with a port to reply on.
    async fn on_message(&self, message: &Value, reply: Option<ReplyPort>);
}
