//! Owner of fire-and-forget work such as background revalidation.
//!
//! Tasks are not tied to the request that scheduled them. The host keeps the
//! sink alive for as long as it wants them to run; dropping the last handle
//! aborts whatever is still pending.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinSet;

#[derive(Debug, Clone, Default)]
pub struct BackgroundTasks {
    tasks: Arc<Mutex<JoinSet<()>>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `task` onto the current runtime and return immediately.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        // reap finished tasks so the set does not grow without bound
        while tasks.try_join_next().is_some() {}
        tasks.spawn(task);
    }

    /// Number of tasks spawned and not yet reaped.
    pub fn pending(&self) -> usize {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Wait until every scheduled task, including ones spawned meanwhile, has finished.
    pub async fn drain(&self) {
        loop {
            let mut batch = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
            if batch.is_empty() {
                return;
            }
            while let Some(result) = batch.join_next().await {
                if let Err(e) = result {
                    tracing::warn!(error = %e, "background task did not complete");
                }
            }
        }
    }
}
