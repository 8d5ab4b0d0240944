//! Deadline-bounded async access to a blocking store.
//!
//! Store backends are synchronous. [`AsyncBlockStore`] runs each call on
//! tokio's blocking pool and gives up waiting once the caller's deadline
//! elapses. Giving up does not abort the backend call: a timed-out insert
//! has an unknown outcome and may still commit.

use std::sync::Arc;
use std::time::Duration;

use ibcscan_types::{BlockHash, BlockRecord};

use crate::{BlockRecordStore, StoreError};

/// Async wrapper that bounds every store call by a timeout.
///
/// Dropping a returned future cancels the wait, never the write.
pub struct AsyncBlockStore<S> {
    inner: Arc<S>,
    timeout: Duration,
}

impl<S> Clone for AsyncBlockStore<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            timeout: self.timeout,
        }
    }
}

impl<S> AsyncBlockStore<S>
where
    S: BlockRecordStore + Send + Sync + 'static,
{
    pub fn new(inner: Arc<S>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    /// A handle to the same store with a different deadline.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The wrapped blocking store.
    pub fn inner(&self) -> &Arc<S> {
        &self.inner
    }

    pub async fn insert(&self, record: BlockRecord) -> Result<(), StoreError> {
        self.run(move |store| store.insert(&record)).await
    }

    pub async fn find_latest_block(&self) -> Result<Option<BlockRecord>, StoreError> {
        self.run(|store| store.find_latest_block()).await
    }

    pub async fn find_by_hash(&self, hash: BlockHash) -> Result<Option<BlockRecord>, StoreError> {
        self.run(move |store| store.find_by_hash(&hash)).await
    }

    pub async fn contains_hash(&self, hash: BlockHash) -> Result<bool, StoreError> {
        self.run(move |store| store.contains_hash(&hash)).await
    }

    pub async fn find_by_height(&self, height: u64) -> Result<Vec<BlockRecord>, StoreError> {
        self.run(move |store| store.find_by_height(height)).await
    }

    pub async fn recent_blocks(&self, limit: usize) -> Result<Vec<BlockRecord>, StoreError> {
        self.run(move |store| store.recent_blocks(limit)).await
    }

    pub async fn block_count(&self) -> Result<u64, StoreError> {
        self.run(|store| store.block_count()).await
    }

    async fn run<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&S) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.inner);
        let task = tokio::task::spawn_blocking(move || op(&store));
        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(StoreError::Backend(format!(
                "store task failed: {join_err}"
            ))),
            Err(_) => {
                tracing::warn!(timeout_ms = self.timeout.as_millis() as u64, "store call timed out");
                Err(StoreError::Timeout(self.timeout))
            }
        }
    }
}
