use crate::appearance::{AppearanceError, AppearanceResult};
use crate::networking::{NetworkError, NetworkResult};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Cancelling side of a [`CancelToken`]
#[derive(Debug)]
pub struct CancelSource {
    tx: watch::Sender<bool>,
}

impl CancelSource {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn token(&self) -> CancelToken {
        CancelToken { rx: Some(self.tx.subscribe()) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Raced against every blocking wait of a run
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelToken {
    /// A token that is never cancelled
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    /// Resolves once cancellation is requested
    pub async fn cancelled(&self) {
        let Some(rx) = self.rx.as_ref() else {
            return std::future::pending().await;
        };
        let mut rx = rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // source dropped without cancelling
                return std::future::pending().await;
            }
        }
    }

    /// Wait for `operation` with a deadline, giving up early on cancellation
    pub async fn guard<T, F>(&self, timeout: Duration, what: &str, operation: F) -> AppearanceResult<T>
    where
        F: Future<Output = NetworkResult<T>>,
    {
        if self.is_cancelled() {
            return Err(AppearanceError::Cancelled);
        }
        tokio::select! {
            _ = self.cancelled() => Err(AppearanceError::Cancelled),
            result = tokio::time::timeout(timeout, operation) => match result {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(AppearanceError::Network(e)),
                Err(_) => Err(AppearanceError::Network(NetworkError::timeout(what))),
            },
        }
    }
}

/// Run `task` over `items` with at most `limit` in flight and wait for all of them.
///
/// Results come back in input order. A task that panics is logged and left
/// out of the result.
pub async fn parallel_for<T, R, F, Fut>(items: Vec<T>, limit: usize, task: F) -> Vec<R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let task = Arc::new(task);
    let mut set = JoinSet::new();
    let total = items.len();

    for (index, item) in items.into_iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        let task = Arc::clone(&task);
        set.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            (index, task(item).await)
        });
    }

    let mut results = Vec::with_capacity(total);
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(e) => warn!("⚠️ Parallel task failed to complete: {}", e),
        }
    }
    debug!("🧵 parallel_for finished {}/{} tasks (limit {})", results.len(), total, limit);

    results.sort_by_key(|(index, _)| *index);
    results.into_iter().map(|(_, result)| result).collect()
}
