use thiserror::Error;

use super::config::ConfigBuilderError;

/// Error type returned by processing functions.
///
/// It is never inspected by the coordinator, only forwarded to the callback.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Outcome of a `put` that did not simply land in a free slot.
///
/// Every variant carries the elements the caller has to consider lost (or
/// handle itself: re-queue, log, drop).
#[derive(Debug, Error)]
pub enum PutError<T> {
    /// The deadline fired before a slot freed up.
    ///
    /// Under `Block` this holds exactly the element being put. Under
    /// `DiscardOldest` it holds the elements evicted before the deadline
    /// fired, followed by the element being put.
    #[error("deadline exceeded before the element could be buffered")]
    DeadlineExceeded(Vec<T>),

    /// The buffer was full and the element being put was dropped.
    #[error("buffer full, element discarded")]
    Discard(Vec<T>),

    /// The element was buffered, but only after evicting older elements.
    ///
    /// Concurrent producers may race for a freed slot, so more than one
    /// element can be evicted for a single put.
    #[error("buffer full, evicted {} oldest element(s)", .0.len())]
    DiscardOldest(Vec<T>),

    /// The coordinator no longer accepts elements.
    #[error("coordinator closed")]
    Closed(Vec<T>),
}

impl<T> PutError<T> {
    /// Elements that did not make it into (or were pushed out of) the buffer.
    pub fn discarded(&self) -> &[T] {
        match self {
            PutError::DeadlineExceeded(items)
            | PutError::Discard(items)
            | PutError::DiscardOldest(items)
            | PutError::Closed(items) => items,
        }
    }

    pub fn into_discarded(self) -> Vec<T> {
        match self {
            PutError::DeadlineExceeded(items)
            | PutError::Discard(items)
            | PutError::DiscardOldest(items)
            | PutError::Closed(items) => items,
        }
    }

    /// Whether the element being put ended up in the buffer anyway.
    #[inline]
    pub fn is_inserted(&self) -> bool {
        matches!(self, PutError::DiscardOldest(_))
    }
}

/// Errors surfaced by the coordinator lifecycle and setup.
#[derive(Debug, Error)]
pub enum ProsumerError {
    #[error("coordinator already started")]
    AlreadyStarted,

    #[error("coordinator was never started")]
    NotStarted,

    #[error("coordinator closed")]
    Closed,

    #[error("invalid configuration")]
    Config(#[from] ConfigBuilderError),

    #[error("failed to open log file {path}")]
    LogFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to install tracing subscriber")]
    Tracing(#[source] tracing_subscriber::util::TryInitError),
}
