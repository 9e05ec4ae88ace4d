// src/coordinator/consumer.rs

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

use super::types::BoxError;

/// Processing function a worker hands each flushed batch to.
///
/// Errors are never retried and never stop the worker; they are passed on
/// to the configured [`Callback`]. A panic kills the worker task.
#[async_trait]
pub trait Consumer<T>: Send + Sync {
    async fn consume(&self, batch: &[T]) -> Result<(), BoxError>;
}

#[async_trait]
impl<T, F, Fut> Consumer<T> for F
where
    F: Fn(&[T]) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), BoxError>> + Send,
    T: Send + Sync,
{
    async fn consume(&self, batch: &[T]) -> Result<(), BoxError> {
        self(batch).await
    }
}

/// Completion hook invoked after every non-empty flush.
pub type Callback<T> = Arc<dyn Fn(&[T], Option<&BoxError>) + Send + Sync>;
