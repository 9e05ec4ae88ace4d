use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{sleep, timeout_at, Instant};

use super::barrier::CompletionBarrier;
use super::config::RejectPolicy;
use super::types::PutError;

/// Poll period of the graceful drain step.
const DRAIN_BACKOFF: Duration = Duration::from_millis(50);

/// Fixed-capacity FIFO shared by every producer and worker.
///
/// Inserts always try a free slot first and only fall back to the reject
/// policy when the buffer is full.
pub(crate) struct BoundedQueue<T> {
    sender: mpsc::Sender<T>,
    pub(super) receiver: Mutex<mpsc::Receiver<T>>,
    policy: RejectPolicy,
    closed: AtomicBool,
    drained: AtomicBool,
    barrier: Arc<CompletionBarrier>,
}

impl<T> BoundedQueue<T>
where
    T: Send,
{
    pub(crate) fn new(capacity: usize, policy: RejectPolicy, barrier: Arc<CompletionBarrier>) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);

        Self {
            sender,
            receiver: Mutex::new(receiver),
            policy,
            closed: AtomicBool::new(false),
            drained: AtomicBool::new(false),
            barrier,
        }
    }

    pub(crate) async fn enqueue(&self, item: T, deadline: Option<Instant>) -> Result<(), PutError<T>> {
        let item = match self.sender.try_send(item) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Closed(item)) => return Err(PutError::Closed(vec![item])),
            Err(TrySendError::Full(item)) => item,
        };

        match self.policy {
            RejectPolicy::Block => self.enqueue_blocking(item, deadline).await,
            RejectPolicy::Discard => {
                tracing::trace!("buffer full, discarding element");
                Err(PutError::Discard(vec![item]))
            }
            RejectPolicy::DiscardOldest => self.enqueue_evicting(item, deadline).await,
        }
    }

    async fn enqueue_blocking(&self, item: T, deadline: Option<Instant>) -> Result<(), PutError<T>> {
        let permit = match deadline {
            Some(deadline) => match timeout_at(deadline, self.sender.reserve()).await {
                Ok(permit) => permit,
                Err(_) => return Err(PutError::DeadlineExceeded(vec![item])),
            },
            None => self.sender.reserve().await,
        };

        match permit {
            Ok(permit) => {
                permit.send(item);
                Ok(())
            }
            Err(_) => Err(PutError::Closed(vec![item])),
        }
    }

    /// Evicts from the head until the element fits.
    ///
    /// Other producers may grab the slot freed by an eviction, so a single
    /// call can evict several elements. Every one of them is reported.
    async fn enqueue_evicting(&self, mut item: T, deadline: Option<Instant>) -> Result<(), PutError<T>> {
        let mut evicted = Vec::new();

        loop {
            if let Some(oldest) = self.dequeue().await {
                evicted.push(oldest);
            }

            match self.sender.try_send(item) {
                // a worker freed the slot before anything was evicted
                Ok(()) if evicted.is_empty() => return Ok(()),
                Ok(()) => {
                    tracing::trace!(evicted = evicted.len(), "evicted oldest elements");
                    return Err(PutError::DiscardOldest(evicted));
                }
                Err(TrySendError::Closed(rejected)) => {
                    evicted.push(rejected);
                    return Err(PutError::Closed(evicted));
                }
                Err(TrySendError::Full(rejected)) => item = rejected,
            }

            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                evicted.push(item);
                return Err(PutError::DeadlineExceeded(evicted));
            }
            tokio::task::yield_now().await;
        }
    }

    /// Takes the head element if one is ready.
    ///
    /// `None` only means the buffer is empty right now, not that it is closed.
    pub(crate) async fn dequeue(&self) -> Option<T> {
        self.receiver.lock().await.try_recv().ok()
    }

    pub(crate) fn len(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stops intake. Buffered elements stay available to `dequeue`.
    ///
    /// A graceful close waits for the buffer to empty and then checks the
    /// drain step out of the completion barrier. The wait is abandoned once
    /// no worker is left to empty the buffer.
    pub(crate) async fn close(&self, graceful: bool) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.receiver.lock().await.close();
        }

        if !graceful || self.drained.swap(true, Ordering::AcqRel) {
            return;
        }

        while self.len() > 0 && self.barrier.remaining() > 1 {
            sleep(DRAIN_BACKOFF).await;
        }
        if self.len() > 0 {
            tracing::warn!(remaining = self.len(), "no worker left to drain the buffer");
        }
        self.barrier.done();
    }
}
