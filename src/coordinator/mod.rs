mod barrier;
pub mod config;
pub mod consumer;
#[allow(clippy::module_inception)]
pub mod coordinator;
mod queue;
pub mod types;
mod worker;

pub use config::{Config, ConfigBuilder, ConfigBuilderError, RejectPolicy};
pub use consumer::{Callback, Consumer};
pub use coordinator::Coordinator;
pub use types::{BoxError, ProsumerError, PutError};
