use super::*;
use crate::coordinator::config::{ConfigBuilder, RejectPolicy};
use crate::coordinator::types::BoxError;
use async_trait::async_trait;
use std::sync::atomic::AtomicUsize;
use tokio::time::{sleep, timeout};

// Consumer that records every element it is handed, in delivery order
struct CollectingConsumer {
    items: Arc<tokio::sync::Mutex<Vec<i32>>>,
}

#[async_trait]
impl Consumer<i32> for CollectingConsumer {
    async fn consume(&self, batch: &[i32]) -> Result<(), BoxError> {
        self.items.lock().await.extend_from_slice(batch);
        Ok(())
    }
}

// Consumer that only counts elements
struct CountingConsumer {
    counter: Arc<AtomicUsize>,
}

#[async_trait]
impl Consumer<i32> for CountingConsumer {
    async fn consume(&self, batch: &[i32]) -> Result<(), BoxError> {
        self.counter.fetch_add(batch.len(), Ordering::SeqCst);
        Ok(())
    }
}

// Consumer that tracks batch sizes and always fails
struct FailingConsumer {
    sizes: Arc<tokio::sync::Mutex<Vec<usize>>>,
}

#[async_trait]
impl Consumer<i32> for FailingConsumer {
    async fn consume(&self, batch: &[i32]) -> Result<(), BoxError> {
        self.sizes.lock().await.push(batch.len());
        Err("sink unavailable".into())
    }
}

struct PanickingConsumer;

#[async_trait]
impl Consumer<i32> for PanickingConsumer {
    async fn consume(&self, batch: &[i32]) -> Result<(), BoxError> {
        if batch.is_empty() {
            return Ok(());
        }
        panic!("consumer bug");
    }
}

const BUFFER_SIZE: usize = 100;
const MAX_LOOP: i32 = 200;

fn collecting(policy: RejectPolicy) -> (Coordinator<i32>, Arc<tokio::sync::Mutex<Vec<i32>>>) {
    let items = Arc::new(tokio::sync::Mutex::new(Vec::new()));
    let config = ConfigBuilder::default()
        .consumer(CollectingConsumer {
            items: Arc::clone(&items),
        })
        .batch_size(21)
        .batch_interval(Duration::from_millis(50))
        .buffer_size(BUFFER_SIZE)
        .num_consumer(1)
        .reject_policy(policy)
        .build()
        .unwrap();

    (Coordinator::new(config), items)
}

fn is_ascending(items: &[i32]) -> bool {
    items.windows(2).all(|pair| pair[0] < pair[1])
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_block_preserves_order() {
    let (coord, received) = collecting(RejectPolicy::Block);
    coord.start().unwrap();

    for i in 0..MAX_LOOP {
        coord.put(i, None).await.unwrap();
    }
    coord.close(true).await.unwrap();

    let received = received.lock().await;
    assert_eq!(*received, (0..MAX_LOOP).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_discard_keeps_ascending_subsequence() {
    let (coord, received) = collecting(RejectPolicy::Discard);
    coord.start().unwrap();

    let mut discarded = 0;
    for i in 0..MAX_LOOP {
        if let Err(err) = coord.put(i, None).await {
            assert!(matches!(err, PutError::Discard(_)));
            assert_eq!(err.discarded(), &[i]);
            discarded += 1;
        }
    }
    coord.close(true).await.unwrap();

    let received = received.lock().await;
    assert!(received.len() >= BUFFER_SIZE);
    assert!(received.len() <= MAX_LOOP as usize);
    assert_eq!(received.len() + discarded, MAX_LOOP as usize);
    assert!(is_ascending(&received));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_discard_oldest_keeps_ascending_subsequence() {
    let (coord, received) = collecting(RejectPolicy::DiscardOldest);
    coord.start().unwrap();

    let mut evicted = Vec::new();
    for i in 0..MAX_LOOP {
        if let Err(err) = coord.put(i, None).await {
            assert!(err.is_inserted());
            evicted.extend(err.into_discarded());
        }
    }
    coord.close(true).await.unwrap();

    let received = received.lock().await;
    assert!(received.len() >= BUFFER_SIZE);
    assert!(received.len() <= MAX_LOOP as usize);
    assert_eq!(received.len() + evicted.len(), MAX_LOOP as usize);
    assert!(is_ascending(&received));
    assert!(is_ascending(&evicted));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_multiple_consumers_deliver_everything() {
    let counter = Arc::new(AtomicUsize::new(0));
    let config = ConfigBuilder::default()
        .consumer(CountingConsumer {
            counter: Arc::clone(&counter),
        })
        .batch_size(21)
        .batch_interval(Duration::from_millis(50))
        .buffer_size(BUFFER_SIZE)
        .num_consumer(20)
        .reject_policy(RejectPolicy::Block)
        .build()
        .unwrap();
    let coord = Coordinator::new(config);
    coord.start().unwrap();

    let max_loop = 2000;
    for i in 0..max_loop {
        coord.put(i, None).await.unwrap();
    }
    coord.close(true).await.unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), max_loop as usize);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_producers() {
    let counter = Arc::new(AtomicUsize::new(0));
    let config = ConfigBuilder::default()
        .consumer(CountingConsumer {
            counter: Arc::clone(&counter),
        })
        .batch_size(16)
        .buffer_size(32)
        .num_consumer(4)
        .build()
        .unwrap();
    let coord = Coordinator::new(config);
    coord.start().unwrap();

    let mut producers = Vec::new();
    for p in 0..4 {
        let producer = coord.clone();
        producers.push(tokio::spawn(async move {
            for i in 0..250 {
                producer.put(p * 1000 + i, None).await.unwrap();
            }
        }));
    }
    for producer in producers {
        producer.await.unwrap();
    }
    coord.close(true).await.unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 1000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_batch_interval_flushes_partial_batches() {
    let sizes = Arc::new(tokio::sync::Mutex::new(Vec::new()));
    let callback_errors = Arc::new(AtomicUsize::new(0));
    let errors = Arc::clone(&callback_errors);

    let config = ConfigBuilder::default()
        .consumer(FailingConsumer {
            sizes: Arc::clone(&sizes),
        })
        .batch_size(10)
        .batch_interval(Duration::from_millis(100))
        .num_consumer(1)
        .callback(move |_batch: &[i32], err: Option<&BoxError>| {
            if err.is_some_and(|e| e.to_string() == "sink unavailable") {
                errors.fetch_add(1, Ordering::SeqCst);
            }
        })
        .build()
        .unwrap();
    let coord = Coordinator::new(config);
    coord.start().unwrap();

    let max_loop = 10;
    for i in 0..max_loop {
        coord.put(i, None).await.unwrap();
        if i == 1 {
            // queue runs dry and the timer fires before batch_size is reached
            sleep(Duration::from_millis(300)).await;
        } else {
            sleep(Duration::from_millis(50)).await;
        }
    }
    coord.close(true).await.unwrap();

    let sizes = sizes.lock().await;
    assert_eq!(sizes.iter().sum::<usize>(), max_loop as usize);
    assert!(sizes.iter().any(|&size| size < 10));
    // the callback runs after every flush, errors included
    assert_eq!(callback_errors.load(Ordering::SeqCst), sizes.len());
}

#[tokio::test]
async fn test_put_deadline_exceeded() {
    let config = ConfigBuilder::default()
        .consumer(|_batch: &[i32]| async { Ok::<(), BoxError>(()) })
        .buffer_size(1)
        .batch_size(10)
        .batch_interval(Duration::from_secs(3600))
        .build()
        .unwrap();
    let coord = Coordinator::new(config);

    let deadline = Instant::now() + Duration::from_millis(100);
    coord.put(1, deadline).await.unwrap();

    match coord.put(2, deadline).await {
        Err(PutError::DeadlineExceeded(items)) => assert_eq!(items, vec![2]),
        other => panic!("expected DeadlineExceeded, got {:?}", other),
    }
    assert!(Instant::now() >= deadline);
    assert_eq!(coord.len(), 1);
    assert_eq!(coord.remaining_capacity(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_close_is_idempotent() {
    let (coord, received) = collecting(RejectPolicy::Block);
    coord.start().unwrap();

    for i in 0..50 {
        coord.put(i, None).await.unwrap();
    }
    coord.close(true).await.unwrap();
    assert_eq!(coord.remaining_capacity(), coord.capacity());
    assert!(coord.is_empty());

    coord.close(true).await.unwrap();
    coord.close(false).await.unwrap();
    assert_eq!(received.lock().await.len(), 50);

    match coord.put(99, None).await {
        Err(PutError::Closed(items)) => assert_eq!(items, vec![99]),
        other => panic!("expected Closed, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_non_graceful_close_drains_in_background() {
    let counter = Arc::new(AtomicUsize::new(0));
    let config = ConfigBuilder::default()
        .consumer(CountingConsumer {
            counter: Arc::clone(&counter),
        })
        .batch_size(10)
        .batch_interval(Duration::from_millis(20))
        .num_consumer(2)
        .build()
        .unwrap();
    let coord = Coordinator::new(config);
    coord.start().unwrap();

    for i in 0..100 {
        coord.put(i, None).await.unwrap();
    }
    coord.close(false).await.unwrap();
    assert!(coord.put(100, None).await.is_err());

    timeout(Duration::from_secs(2), async {
        while counter.load(Ordering::SeqCst) < 100 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("workers should keep draining after a non-graceful close");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_graceful_after_non_graceful_close() {
    let (coord, received) = collecting(RejectPolicy::Block);
    coord.start().unwrap();

    for i in 0..60 {
        coord.put(i, None).await.unwrap();
    }
    coord.close(false).await.unwrap();
    coord.close(true).await.unwrap();

    assert_eq!(*received.lock().await, (0..60).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_start_twice_is_rejected() {
    let (coord, _received) = collecting(RejectPolicy::Block);

    coord.start().unwrap();
    assert!(matches!(coord.start(), Err(ProsumerError::AlreadyStarted)));

    coord.close(true).await.unwrap();
    assert!(matches!(coord.start(), Err(ProsumerError::Closed)));
}

#[tokio::test]
async fn test_close_without_start() {
    let (coord, _received) = collecting(RejectPolicy::Block);
    coord.put(1, None).await.unwrap();

    assert!(matches!(coord.close(true).await, Err(ProsumerError::NotStarted)));
    assert!(matches!(coord.put(2, None).await, Err(PutError::Closed(_))));
    assert!(matches!(coord.start(), Err(ProsumerError::Closed)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_default_callback_keeps_worker_alive_on_error() {
    let sizes = Arc::new(tokio::sync::Mutex::new(Vec::new()));
    let config = ConfigBuilder::default()
        .consumer(FailingConsumer {
            sizes: Arc::clone(&sizes),
        })
        .batch_size(5)
        .num_consumer(1)
        .build()
        .unwrap();
    let coord = Coordinator::new(config);
    coord.start().unwrap();

    for i in 0..20 {
        coord.put(i, None).await.unwrap();
    }
    coord.close(true).await.unwrap();

    assert_eq!(sizes.lock().await.iter().sum::<usize>(), 20);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[should_panic(expected = "consumer bug")]
async fn test_consumer_panic_surfaces_on_graceful_close() {
    let config = ConfigBuilder::default()
        .consumer(PanickingConsumer)
        .batch_size(1)
        .batch_interval(Duration::from_millis(20))
        .num_consumer(1)
        .build()
        .unwrap();
    let coord = Coordinator::new(config);
    coord.start().unwrap();

    coord.put(1, None).await.unwrap();
    let _ = coord.close(true).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unbounded_batch_interval() {
    let (coord, received) = {
        let items = Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let config = ConfigBuilder::default()
            .consumer(CollectingConsumer {
                items: Arc::clone(&items),
            })
            .batch_size(1)
            .batch_interval(Duration::MAX)
            .num_consumer(1)
            .build()
            .unwrap();
        (Coordinator::new(config), items)
    };
    coord.start().unwrap();

    coord.put(1, None).await.unwrap();
    coord.put(2, None).await.unwrap();
    coord.close(true).await.unwrap();

    assert_eq!(*received.lock().await, vec![1, 2]);
}
