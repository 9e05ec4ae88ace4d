// src/coordinator/config.rs

use derive_builder::Builder;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::consumer::{Callback, Consumer};
use super::types::BoxError;

pub const DEFAULT_BUFFER_SIZE: usize = 10_000;
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_BATCH_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_NUM_CONSUMER: usize = 2;

/// Decides what happens to a `put` when the buffer is at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RejectPolicy {
    /// Wait for a free slot (or the deadline). Nothing is discarded.
    #[default]
    Block,
    /// Drop the element being put.
    Discard,
    /// Evict the oldest buffered elements to make room.
    DiscardOldest,
}

/// Coordinator configuration.
///
/// Zero-valued sizes and intervals are replaced by the `DEFAULT_*` values
/// when the builder runs, whether they were set explicitly or omitted.
#[derive(Builder)]
#[builder(pattern = "owned", build_fn(private, name = "build_unchecked"))]
pub struct Config<T> {
    /// Capacity of the inner buffer
    #[builder(default)]
    pub(crate) buffer_size: usize,

    /// What to do with a put when the buffer is full
    #[builder(default)]
    pub(crate) reject_policy: RejectPolicy,

    /// Number of elements that triggers a flush
    #[builder(default)]
    pub(crate) batch_size: usize,

    /// Maximum time between two flushes of a worker
    #[builder(default)]
    pub(crate) batch_interval: Duration,

    /// Number of concurrent worker tasks
    #[builder(default)]
    pub(crate) num_consumer: usize,

    #[builder(setter(custom))]
    pub(crate) consumer: Arc<dyn Consumer<T>>,

    /// Falls back to logging failed batches when unset
    #[builder(setter(custom), default)]
    pub(crate) callback: Option<Callback<T>>,
}

impl<T> ConfigBuilder<T> {
    /// Sets the processing function every flushed batch is handed to.
    pub fn consumer<C>(mut self, consumer: C) -> Self
    where
        C: Consumer<T> + 'static,
    {
        let consumer: Arc<dyn Consumer<T>> = Arc::new(consumer);
        self.consumer = Some(consumer);
        self
    }

    /// Sets the hook invoked after every flush with the batch and the
    /// processing function's error, if any.
    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&[T], Option<&BoxError>) + Send + Sync + 'static,
    {
        let callback: Callback<T> = Arc::new(callback);
        self.callback = Some(Some(callback));
        self
    }

    pub fn build(self) -> Result<Config<T>, ConfigBuilderError> {
        self.build_unchecked().map(Config::with_defaults)
    }
}

impl<T> Config<T> {
    fn with_defaults(mut self) -> Self {
        if self.buffer_size == 0 {
            self.buffer_size = DEFAULT_BUFFER_SIZE;
        }
        if self.batch_size == 0 {
            self.batch_size = DEFAULT_BATCH_SIZE;
        }
        if self.batch_interval.is_zero() {
            self.batch_interval = DEFAULT_BATCH_INTERVAL;
        }
        if self.num_consumer == 0 {
            self.num_consumer = DEFAULT_NUM_CONSUMER;
        }
        self
    }

    #[inline]
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    #[inline]
    pub fn reject_policy(&self) -> RejectPolicy {
        self.reject_policy
    }

    #[inline]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    #[inline]
    pub fn batch_interval(&self) -> Duration {
        self.batch_interval
    }

    #[inline]
    pub fn num_consumer(&self) -> usize {
        self.num_consumer
    }
}

impl<T> fmt::Debug for Config<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("buffer_size", &self.buffer_size)
            .field("reject_policy", &self.reject_policy)
            .field("batch_size", &self.batch_size)
            .field("batch_interval", &self.batch_interval)
            .field("num_consumer", &self.num_consumer)
            .field("callback", &self.callback.is_some())
            .finish_non_exhaustive()
    }
}
