//! Bounded, cancellable query execution
//!
//! Queries run as spawned tasks holding a slot from a fixed-size semaphore.
//! One wall-clock deadline covers both waiting for a slot and running the
//! query. When it passes, the task is aborted: the in-flight HTTP request is
//! dropped with it and the slot is released as the permit drops.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::{Instant, timeout_at};

use crate::error::{GatewayError, Result};

/// Fixed-size pool of query slots with a shared timeout
#[derive(Debug, Clone)]
pub struct QueryPool {
    slots: Arc<Semaphore>,
    size: usize,
    timeout: Duration,
}

impl QueryPool {
    pub fn new(size: usize, timeout: Duration) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(size)),
            size,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Slots not currently held by a running query
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    /// Stop handing out slots; running queries finish normally
    pub fn close(&self) {
        self.slots.close();
    }

    /// Run `work` on a pool slot within the pool timeout
    ///
    /// # Errors
    ///
    /// * [`GatewayError::QueryTimeout`] if no slot frees up or the work does
    ///   not finish before the deadline. Nothing the work produced escapes.
    /// * [`GatewayError::Connection`] if the pool has been closed.
    /// * Whatever error the work itself returns.
    pub async fn run<T, F>(&self, operation: &str, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let deadline = Instant::now() + self.timeout;
        let secs = self.timeout.as_secs();

        let permit = match timeout_at(deadline, self.slots.clone().acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_closed)) => {
                return Err(GatewayError::Connection(
                    "query pool is shutting down".to_string(),
                ));
            }
            Err(_elapsed) => {
                log::warn!("{} timed out after {}s waiting for a query slot", operation, secs);
                return Err(GatewayError::QueryTimeout { secs });
            }
        };

        let mut handle = tokio::spawn(async move {
            let _permit = permit;
            work.await
        });

        match timeout_at(deadline, &mut handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(GatewayError::QueryExecution(format!(
                "{} failed: {}",
                operation, join_err
            ))),
            Err(_elapsed) => {
                handle.abort();
                log::warn!("{} timed out after {}s", operation, secs);
                Err(GatewayError::QueryTimeout { secs })
            }
        }
    }
}
