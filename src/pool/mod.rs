//! Bounded-concurrency task pool shared by the property and booking fan-outs.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinError;

#[derive(Debug, Clone)]
pub struct WorkerPool {
    sem: Arc<Semaphore>,
    limit: usize,
}

impl WorkerPool {
    /// A limit of zero is treated as one.
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            sem: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Run `f` over every item with at most `limit` in flight.
    ///
    /// Results come back in input order. A panicking task yields its `JoinError`
    /// in place; the other tasks are unaffected.
    pub async fn map<T, R, F, Fut>(&self, items: Vec<T>, f: F) -> Vec<Result<R, JoinError>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let f = Arc::new(f);
        let mut handles = Vec::with_capacity(items.len());

        for item in items {
            let sem = Arc::clone(&self.sem);
            let f = Arc::clone(&f);
            handles.push(tokio::spawn(async move {
                // the pool never closes its semaphore
                let _permit = sem.acquire_owned().await.ok();
                f(item).await
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(handle.await);
        }
        results
    }
}
