//! Time-triggered batching: the batch size is never reached, so every
//! batch is flushed by the interval.
//!
//! Run with: cargo run --example demo

use prosumer::{logging, BoxError, ConfigBuilder, Coordinator, ProsumerError};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), ProsumerError> {
    logging::init()?;

    let max_loop = 10;
    let config = ConfigBuilder::default()
        .consumer(|batch: &[i32]| {
            println!("get {:?}", batch);
            async { Ok::<(), BoxError>(()) }
        })
        .batch_size(max_loop + 1)
        .num_consumer(1)
        .buffer_size(max_loop)
        .batch_interval(Duration::from_secs(1))
        .build()?;

    let coordinator = Coordinator::new(config);
    coordinator.start()?;

    for i in 0..max_loop as i32 {
        println!("try put {}", i);
        if let Err(err) = coordinator.put(i, None).await {
            eprintln!("discarded elements {:?} for err {}", err.discarded(), err);
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    coordinator.close(true).await?;
    println!("\nDemo completed!");
    Ok(())
}
