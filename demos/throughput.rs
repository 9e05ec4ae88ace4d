//! Endless producer printing how many elements were consumed per second.
//!
//! Run with: cargo run --release --example throughput [workers]

use prosumer::{logging, BoxError, ConfigBuilder, Coordinator, ProsumerError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), ProsumerError> {
    logging::init()?;

    let workers = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or_else(num_cpus::get);

    let ops = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&ops);
    let config = ConfigBuilder::default()
        .consumer(move |batch: &[u64]| {
            counter.fetch_add(batch.len() as u64, Ordering::Relaxed);
            async { Ok::<(), BoxError>(()) }
        })
        .batch_size(512)
        .num_consumer(workers)
        .build()?;

    let coordinator = Coordinator::new(config);
    coordinator.start()?;
    println!("Producing with {} worker(s), Ctrl-C to stop", workers);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        let mut last = 0;
        loop {
            ticker.tick().await;
            let current = ops.load(Ordering::Relaxed);
            println!("ops={}", current - last);
            last = current;
        }
    });

    let producer = coordinator.clone();
    tokio::select! {
        _ = async move {
            for i in 0u64.. {
                let _ = producer.put(i, None).await;
            }
        } => {}
        _ = tokio::signal::ctrl_c() => {}
    }

    coordinator.close(false).await?;
    Ok(())
}
