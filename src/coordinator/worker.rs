use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant, Sleep};
use tokio_util::sync::CancellationToken;

use super::barrier::CompletionBarrier;
use super::consumer::{Callback, Consumer};
use super::queue::BoundedQueue;
use super::types::BoxError;

/// Stand-in deadline for intervals too large to add to an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// One batching loop. Workers share the queue and the shutdown token,
/// never their batch.
pub(crate) struct Worker<T> {
    pub(crate) id: usize,
    pub(crate) queue: Arc<BoundedQueue<T>>,
    pub(crate) shutdown: CancellationToken,
    pub(crate) barrier: Arc<CompletionBarrier>,
    pub(crate) consumer: Arc<dyn Consumer<T>>,
    pub(crate) callback: Option<Callback<T>>,
    pub(crate) batch_size: usize,
    pub(crate) batch_interval: Duration,
}

impl<T> Worker<T>
where
    T: Send + Sync + 'static,
{
    /// Drains the queue until it is empty, then waits for either the flush
    /// timer or shutdown. Shutdown is only observed while the queue is
    /// empty, so a worker never leaves ready elements behind.
    pub(crate) async fn run(self) {
        let _checkout = self.barrier.guard();
        let mut batch: Vec<T> = Vec::with_capacity(self.batch_size);
        let timer = sleep(self.batch_interval);
        tokio::pin!(timer);

        tracing::debug!(worker_id = self.id, "worker started");

        loop {
            if let Some(item) = self.queue.dequeue().await {
                batch.push(item);
                if batch.len() >= self.batch_size || Instant::now() >= timer.deadline() {
                    self.flush(&mut batch, timer.as_mut()).await;
                }
                continue;
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    self.flush(&mut batch, timer.as_mut()).await;
                    break;
                }
                _ = &mut timer => {
                    self.flush(&mut batch, timer.as_mut()).await;
                }
            }
        }

        tracing::debug!(worker_id = self.id, "worker stopped");
    }

    /// Hands a non-empty batch to the consumer, then the callback, and
    /// restarts the interval from now.
    async fn flush(&self, batch: &mut Vec<T>, timer: Pin<&mut Sleep>) {
        if !batch.is_empty() {
            tracing::trace!(worker_id = self.id, batch_len = batch.len(), "flushing batch");

            let result = self.consumer.consume(batch).await;
            let err = result.as_ref().err();
            match &self.callback {
                Some(callback) => callback(batch.as_slice(), err),
                None => log_failure(batch.len(), err),
            }
            batch.clear();
        }
        let now = Instant::now();
        timer.reset(
            now.checked_add(self.batch_interval)
                .unwrap_or_else(|| now + FAR_FUTURE),
        );
    }
}

fn log_failure(batch_len: usize, err: Option<&BoxError>) {
    if let Some(err) = err {
        tracing::warn!(batch_len, error = %err, "consumer failed");
    }
}
