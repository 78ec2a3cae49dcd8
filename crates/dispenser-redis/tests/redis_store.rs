//! Runs against a live server: `DISPENSER_TEST_REDIS_URL=redis://127.0.0.1:6379/15`
//! `cargo test -p dispenser-redis -- --ignored`.

use std::time::Duration;

use dispenser_core::config::StoreSettings;
use dispenser_core::domain::QueueName;
use dispenser_core::ports::QueueStore;
use dispenser_redis::RedisQueueStore;

fn settings() -> StoreSettings {
    let url = std::env::var("DISPENSER_TEST_REDIS_URL")
        .unwrap_or_else(|_| "redis://127.0.0.1:6379/15".to_string());
    let rest = url.trim_start_matches("redis://");
    let (addr, db) = rest.split_once('/').unwrap_or((rest, "15"));
    let (host, port) = addr.split_once(':').unwrap_or((addr, "6379"));
    StoreSettings {
        host: host.to_string(),
        port: port.parse().unwrap(),
        password: None,
        db: db.parse().unwrap_or(15),
    }
}

fn unique_queue(tag: &str) -> QueueName {
    QueueName::new(format!("dispenser-test:{tag}:{}", std::process::id()))
}

async fn drain(store: &RedisQueueStore, queue: &QueueName) {
    let len = store.length(queue).await.unwrap();
    store.pop_oldest(queue, len).await.unwrap();
}

#[tokio::test]
#[ignore = "needs a running Redis"]
async fn pop_oldest_returns_in_push_order() {
    let store = RedisQueueStore::connect(&settings()).await.unwrap();
    let queue = unique_queue("order");
    drain(&store, &queue).await;

    for i in 0..5 {
        store.push(&queue, i.to_string()).await.unwrap();
    }
    assert_eq!(store.length(&queue).await.unwrap(), 5);

    assert_eq!(store.pop_oldest(&queue, 3).await.unwrap(), vec!["0", "1", "2"]);
    assert_eq!(store.pop_oldest(&queue, 10).await.unwrap(), vec!["3", "4"]);
    assert_eq!(store.length(&queue).await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "needs a running Redis"]
async fn push_is_notified_as_append() {
    let store = RedisQueueStore::connect(&settings()).await.unwrap();
    let queue = unique_queue("notify");
    let mut subscription = store.subscribe(std::slice::from_ref(&queue)).await.unwrap();

    store.push(&queue, serde_json::json!({"a": 1}).to_string()).await.unwrap();

    let event = tokio::time::timeout(Duration::from_secs(5), subscription.next_event())
        .await
        .unwrap()
        .unwrap();
    assert!(event.is_append());
    assert_eq!(event.queue, queue);
    drain(&store, &queue).await;
}

#[tokio::test]
#[ignore = "needs a running Redis"]
async fn unreachable_server_is_a_connection_error() {
    let settings = StoreSettings {
        port: 1,
        ..StoreSettings::default()
    };
    let err = RedisQueueStore::connect(&settings).await.err().unwrap();
    assert!(matches!(err, dispenser_core::ports::StoreError::Connection(_)));
}
