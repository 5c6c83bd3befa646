//! Bounded worker pool
//!
//! Runs an async operation over a queue of items with at most `workers`
//! operations in flight. The first error stops the pool: queued items are
//! never started and in-flight operations are dropped.

use std::future::Future;
use std::num::NonZeroUsize;

use futures::stream::{self, StreamExt, TryStreamExt};

#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: NonZeroUsize,
}

impl WorkerPool {
    pub fn new(workers: NonZeroUsize) -> Self {
        Self { workers }
    }

    pub fn workers(&self) -> usize {
        self.workers.get()
    }

    /// Apply `op` to every item and collect the results.
    ///
    /// Completion order is not preserved. Returns only once every item has
    /// finished, or as soon as one fails.
    pub async fn run<I, T, F, Fut, R, E>(&self, items: I, op: F) -> Result<Vec<R>, E>
    where
        I: IntoIterator<Item = T>,
        F: FnMut(T) -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        stream::iter(items)
            .map(op)
            .buffer_unordered(self.workers.get())
            .try_collect()
            .await
    }
}
