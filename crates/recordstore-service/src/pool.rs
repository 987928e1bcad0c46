//! Bounded worker pool for per-record I/O
//!
//! One pool is created at startup and shared by every service; its
//! semaphore caps in-flight blob operations across all requests.

use futures::stream::{self, StreamExt};
use recordstore_common::{Error, Result};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Default number of concurrent per-record operations
pub const DEFAULT_MAX_CONCURRENCY: usize = 16;

/// Shared concurrency limit for fan-out work
#[derive(Clone, Debug)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    max_concurrency: usize,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENCY)
    }
}

impl WorkerPool {
    /// Create a pool allowing `max_concurrency` operations at once (at least one)
    #[must_use]
    pub fn new(max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
        }
    }

    #[must_use]
    pub const fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Permits not currently held
    #[must_use]
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `f` over every item with bounded concurrency.
    ///
    /// Each future yields `(record_id, value)`. The first error is returned
    /// and the remaining futures are dropped; on success the results are
    /// merged by record id.
    pub async fn try_map<I, F, Fut, T>(&self, items: I, f: F) -> Result<BTreeMap<String, T>>
    where
        I: IntoIterator,
        F: Fn(I::Item) -> Fut,
        Fut: Future<Output = Result<(String, T)>>,
    {
        let permits = &self.permits;
        let mut tasks = stream::iter(items.into_iter().map(|item| {
            let task = f(item);
            async move {
                let _permit = permits
                    .acquire()
                    .await
                    .map_err(|_| Error::persistence("worker pool closed"))?;
                task.await
            }
        }))
        .buffer_unordered(self.max_concurrency);

        let mut merged = BTreeMap::new();
        while let Some(result) = tasks.next().await {
            let (id, value) = result?;
            merged.insert(id, value);
        }
        Ok(merged)
    }
}
