use futures::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::barrier::CompletionBarrier;
use super::config::Config;
use super::consumer::{Callback, Consumer};
use super::queue::BoundedQueue;
use super::types::{ProsumerError, PutError};
use super::worker::Worker;

/// Producer/consumer front door.
///
/// `put` feeds a bounded buffer; `num_consumer` workers drain it and hand
/// batches to the consumer whenever `batch_size` elements are ready or
/// `batch_interval` has passed since their last flush.
///
/// Clones share the same buffer and workers.
pub struct Coordinator<T> {
    queue: Arc<BoundedQueue<T>>,
    shutdown: CancellationToken,
    barrier: Arc<CompletionBarrier>,
    workers: Arc<Mutex<Vec<JoinHandle<()>>>>,
    started: Arc<AtomicBool>,
    consumer: Arc<dyn Consumer<T>>,
    callback: Option<Callback<T>>,
    batch_size: usize,
    batch_interval: Duration,
    num_consumer: usize,
}

impl<T> Clone for Coordinator<T> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            shutdown: self.shutdown.clone(),
            barrier: self.barrier.clone(),
            workers: self.workers.clone(),
            started: self.started.clone(),
            consumer: self.consumer.clone(),
            callback: self.callback.clone(),
            batch_size: self.batch_size,
            batch_interval: self.batch_interval,
            num_consumer: self.num_consumer,
        }
    }
}

impl<T> Coordinator<T>
where
    T: Send + Sync + 'static,
{
    pub fn new(config: Config<T>) -> Self {
        // one slot per worker, plus the queue's drain step
        let barrier = Arc::new(CompletionBarrier::new(config.num_consumer + 1));
        let queue = BoundedQueue::new(config.buffer_size, config.reject_policy, Arc::clone(&barrier));

        Self {
            queue: Arc::new(queue),
            shutdown: CancellationToken::new(),
            barrier,
            workers: Arc::new(Mutex::new(Vec::with_capacity(config.num_consumer))),
            started: Arc::new(AtomicBool::new(false)),
            consumer: config.consumer,
            callback: config.callback,
            batch_size: config.batch_size,
            batch_interval: config.batch_interval,
            num_consumer: config.num_consumer,
        }
    }

    /// Spawns the workers onto the current tokio runtime.
    pub fn start(&self) -> Result<(), ProsumerError> {
        if self.queue.is_closed() {
            return Err(ProsumerError::Closed);
        }
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(ProsumerError::AlreadyStarted);
        }

        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        for worker_id in 0..self.num_consumer {
            let worker = Worker {
                id: worker_id,
                queue: Arc::clone(&self.queue),
                shutdown: self.shutdown.clone(),
                barrier: Arc::clone(&self.barrier),
                consumer: Arc::clone(&self.consumer),
                callback: self.callback.clone(),
                batch_size: self.batch_size,
                batch_interval: self.batch_interval,
            };
            workers.push(tokio::spawn(worker.run()));
        }

        tracing::info!(
            workers = self.num_consumer,
            capacity = self.queue.capacity(),
            batch_size = self.batch_size,
            batch_interval = ?self.batch_interval,
            "coordinator started"
        );
        Ok(())
    }

    /// Buffers `item`, applying the reject policy when the buffer is full.
    ///
    /// `deadline` bounds how long a `Block` put may wait for a free slot, or
    /// how long a `DiscardOldest` put may keep evicting. `None` waits as long
    /// as it takes. The discarded elements of a failed put are returned in
    /// the error:
    ///
    /// ```rust,ignore
    /// if let Err(err) = coordinator.put(item, None).await {
    ///     tracing::warn!(discarded = err.discarded().len(), %err, "put rejected");
    /// }
    /// ```
    pub async fn put(&self, item: T, deadline: impl Into<Option<Instant>>) -> Result<(), PutError<T>> {
        self.queue.enqueue(item, deadline.into()).await
    }

    /// Stops intake and tells the workers to finish.
    ///
    /// A graceful close returns once every element buffered before the close
    /// has been handed to the consumer. A non-graceful close returns
    /// immediately and the workers finish draining in the background.
    ///
    /// # Panics
    ///
    /// A graceful close re-raises the panic of a worker whose consumer
    /// panicked.
    pub async fn close(&self, graceful: bool) -> Result<(), ProsumerError> {
        if !self.started.load(Ordering::Acquire) {
            self.queue.close(false).await;
            return Err(ProsumerError::NotStarted);
        }

        self.queue.close(graceful).await;
        self.shutdown.cancel();

        if graceful {
            self.barrier.wait().await;
            self.join_workers().await;
        }

        tracing::info!(graceful, "coordinator closed");
        Ok(())
    }

    async fn join_workers(&self) {
        let handles = std::mem::take(&mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner));

        for result in join_all(handles).await {
            if let Err(err) = result {
                if err.is_panic() {
                    std::panic::resume_unwind(err.into_panic());
                }
            }
        }
    }

    /// Free slots in the buffer. Advisory only under concurrent puts.
    pub fn remaining_capacity(&self) -> usize {
        self.queue.capacity() - self.queue.len()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Elements currently buffered.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "coordinator_test.rs"]
mod tests;
