//! Install and activate.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;

use super::{Engine, Failure, FetchMode};
use crate::Error;
use crate::cache::{CacheKey, CachedEntry};
use crate::http::HttpResponse;
use crate::partition::PartitionKind;

/// What install wrote into the static partition, in manifest order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct InstallReport {
    pub cached: Vec<String>,
    /// Manifest URLs whose stored entry was newer than the fetched copy.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
}

/// Orphaned partitions removed on activation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ActivationReport {
    pub deleted: Vec<String>,
    pub failed: Vec<Failure>,
}

impl Engine {
    /// Precache the install manifest into the static partition.
    ///
    /// Skip-waiting is signalled first and regardless of the outcome. The
    /// manifest is all-or-nothing: one failed or non-ok fetch fails install
    /// and nothing is written. The writes share one store transaction, and a
    /// stored entry newer than the fetched copy is kept and reported as skipped.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        self.host.skip_waiting();

        let partition = self.settings.partitions.get(PartitionKind::Static);
        let store = self.db.open_partition(&partition.name).await?;

        let mut urls = Vec::with_capacity(self.settings.precache.len());
        for raw in &self.settings.precache {
            let url = self
                .settings
                .resolve(raw)
                .map_err(|e| Error::InstallFailed(format!("manifest entry {raw:?}: {e}")))?;
            urls.push(url);
        }

        tracing::info!(partition = %partition.name, count = urls.len(), "installing precache manifest");

        let mut join_set = JoinSet::new();
        for (index, url) in urls.iter().cloned().enumerate() {
            let engine = self.clone();
            join_set.spawn(async move {
                let result = engine.fetch_network(&url, FetchMode::Reload).await;
                (index, result)
            });
        }

        let mut responses: Vec<Option<HttpResponse>> = vec![None; urls.len()];
        while let Some(joined) = join_set.join_next().await {
            let (index, result) = joined.map_err(|e| Error::InstallFailed(e.to_string()))?;
            let url = &urls[index];
            match result {
                Ok(response) if response.is_ok() => responses[index] = Some(response),
                Ok(response) => {
                    return Err(Error::InstallFailed(format!("{url} returned HTTP {}", response.status)));
                }
                Err(e) => return Err(Error::InstallFailed(format!("{url}: {e}"))),
            }
        }

        let now = Self::now_ms();
        let mut batch = Vec::with_capacity(urls.len());
        for (url, response) in urls.iter().zip(responses) {
            let Some(response) = response else {
                return Err(Error::InstallFailed(format!("{url}: no response")));
            };
            batch.push((CacheKey::get(url), CachedEntry::stamp(&response, now)));
        }

        let applied = store.put_all(&batch).await?;

        let mut report = InstallReport::default();
        for (url, written) in urls.iter().zip(applied) {
            if written {
                report.cached.push(url.to_string());
            } else {
                tracing::debug!(url = %url, "kept newer cached entry");
                report.skipped.push(url.to_string());
            }
        }

        tracing::info!(partition = %partition.name, cached = report.cached.len(), "install complete");
        Ok(report)
    }

    /// Delete every persisted partition outside the expected set, then claim clients.
    pub async fn activate(&self) -> Result<ActivationReport, Error> {
        let mut report = ActivationReport::default();

        for name in self.db.partition_names().await? {
            if self.settings.partitions.is_expected(&name) {
                continue;
            }
            match self.db.delete_partition(&name).await {
                Ok(_) => {
                    tracing::info!(partition = %name, "deleted orphaned partition");
                    report.deleted.push(name);
                }
                Err(e) => {
                    tracing::warn!(partition = %name, error = %e, "failed to delete orphaned partition");
                    report.failed.push(Failure::new(name, e));
                }
            }
        }

        self.host.claim_clients();
        Ok(report)
    }
}
