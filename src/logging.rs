//! Diagnostics setup.
//!
//! The library only emits `tracing` events. Binaries that want to see them
//! call [`init`] once at startup.

use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::coordinator::ProsumerError;

/// Names a file that receives the logs instead of stdout.
pub const LOG_FILE_ENV: &str = "PROSUMER_LOGFILE";

const DEFAULT_FILTER: &str = "prosumer=info";

/// Installs a global fmt subscriber filtered by `RUST_LOG`.
///
/// Logs go to stdout, or are appended to the file named by
/// `PROSUMER_LOGFILE` when it is set.
pub fn init() -> Result<(), ProsumerError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match std::env::var_os(LOG_FILE_ENV) {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|source| ProsumerError::LogFile {
                    path: path.to_string_lossy().into_owned(),
                    source,
                })?;
            registry
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .try_init()
        }
        None => registry.with(fmt::layer().with_writer(std::io::stdout)).try_init(),
    };

    installed.map_err(ProsumerError::Tracing)
}
