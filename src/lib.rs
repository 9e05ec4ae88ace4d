//! # prosumer
//!
//! A batching producer/consumer primitive built on Tokio.
//!
//! ## Features
//!
//! - **Bounded buffer** with `Block`, `Discard` and `DiscardOldest` overflow policies
//! - **Size-or-time batching**: a batch is flushed when it is full or when
//!   the batch interval has elapsed, whichever comes first
//! - **Worker pool** draining one shared buffer
//! - **Graceful close** that delivers every buffered element before returning
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use prosumer::{BoxError, ConfigBuilder, Coordinator, RejectPolicy};
//! use std::time::Duration;
//!
//! let config = ConfigBuilder::default()
//!     .consumer(|batch: &[u64]| {
//!         let len = batch.len();
//!         async move {
//!             println!("got {} element(s)", len);
//!             Ok::<(), BoxError>(())
//!         }
//!     })
//!     .buffer_size(1_000)
//!     .batch_size(64)
//!     .batch_interval(Duration::from_millis(200))
//!     .reject_policy(RejectPolicy::Block)
//!     .build()?;
//!
//! let coordinator = Coordinator::new(config);
//! coordinator.start()?;
//! for i in 0..10_000u64 {
//!     if let Err(err) = coordinator.put(i, None).await {
//!         eprintln!("discarded {:?}: {}", err.discarded(), err);
//!     }
//! }
//! coordinator.close(true).await?;
//! ```
//!
//! ## Modules
//!
//! - [`coordinator`] - buffer, workers and their lifecycle
//! - [`logging`] - optional `tracing` subscriber setup

pub mod coordinator;
pub mod logging;

pub use coordinator::{
    BoxError, Callback, Config, ConfigBuilder, ConfigBuilderError, Consumer, Coordinator,
    ProsumerError, PutError, RejectPolicy,
};
