use crate::helper::{body, config, drain, push_all};
use leasemq::error::to_queue_error;
use leasemq::{ErrorKind, QueueService};
use std::collections::BTreeSet;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_producers_and_consumers_deliver_everything() {
    let service = QueueService::in_memory(config(5_000)).await.unwrap();

    let consumers: Vec<_> = (0..3)
        .map(|_| {
            let consumer = service.consumer();

            tokio::spawn(async move { drain(&consumer, Duration::from_millis(500)).await })
        })
        .collect();

    let producers: Vec<_> = (0..4)
        .map(|p| {
            let service = service.clone();

            tokio::spawn(async move {
                for n in 0..25 {
                    service.push(format!("p{p}-{n}")).await.unwrap();
                }
            })
        })
        .collect();

    for producer in producers {
        producer.await.unwrap();
    }

    let mut received = BTreeSet::new();

    for consumer in consumers {
        for body in consumer.await.unwrap() {
            assert!(received.insert(body), "a deleted message was delivered again");
        }
    }

    let expected: BTreeSet<String> = (0..4)
        .flat_map(|p| (0..25).map(move |n| format!("p{p}-{n}")))
        .collect();

    assert_eq!(received, expected);

    let stats = service.stats().await.unwrap();
    assert_eq!(stats.pushed, 100);
    assert_eq!(stats.released, 100);
    assert_eq!(stats.visible, 0);
    assert_eq!(stats.in_flight, 0);
}

#[tokio::test(start_paused = true)]
async fn slow_consumer_loses_the_message_to_another() {
    let service = QueueService::in_memory(config(500)).await.unwrap();
    let (slow, fast) = (service.consumer(), service.consumer());

    service.push("job").await.unwrap();

    let first = slow.pull().await.unwrap();

    tokio::time::sleep(Duration::from_millis(600)).await;

    let second = fast.pull().await.unwrap();

    assert_eq!(second.id, first.id);
    assert_eq!(body(&second), "job");

    assert!(!slow.delete(first.token).await);
    assert!(fast.delete(second.token).await);

    let stats = service.stats().await.unwrap();
    assert_eq!(stats.expired, 1);
    assert_eq!(stats.released, 1);
}

#[tokio::test(start_paused = true)]
async fn acknowledged_message_is_never_delivered_again() {
    let service = QueueService::in_memory(config(500)).await.unwrap();
    let consumer = service.consumer();

    service.push("once").await.unwrap();

    let delivery = consumer.pull().await.unwrap();

    assert!(consumer.delete(delivery.token).await);
    assert!(!consumer.delete(delivery.token).await);

    assert!(consumer.pull_timeout(Duration::from_secs(5)).await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn redelivered_message_comes_before_newer_ones() {
    let service = QueueService::in_memory(config(500)).await.unwrap();
    let consumer = service.consumer();

    push_all(&service, &["a", "b"]).await;

    let _dropped = consumer.pull().await.unwrap();

    service.push("c").await.unwrap();

    tokio::time::sleep(Duration::from_millis(501)).await;

    let mut order = vec![];
    for _ in 0..3 {
        order.push(body(&consumer.pull().await.unwrap()));
    }

    assert_eq!(order, vec!["a", "b", "c"]);
}

#[tokio::test(start_paused = true)]
async fn abandoned_pull_leaves_the_message_visible() {
    let service = QueueService::in_memory(config(500)).await.unwrap();
    let consumer = service.consumer();

    assert!(consumer.pull_timeout(Duration::from_millis(10)).await.unwrap().is_none());

    service.push("still here").await.unwrap();

    let stats = service.stats().await.unwrap();
    assert_eq!(stats.visible, 1);
    assert_eq!(stats.in_flight, 0);
    assert_eq!(stats.waiting_consumers, 0);

    let delivery = service.consumer().pull().await.unwrap();
    assert_eq!(body(&delivery), "still here");
}

#[tokio::test(start_paused = true)]
async fn timeout_change_applies_to_later_pulls() {
    let service = QueueService::in_memory(config(1_000)).await.unwrap();
    let consumer = service.consumer();

    push_all(&service, &["long", "short"]).await;

    let long = consumer.pull().await.unwrap();

    service.set_timeout_interval(Duration::from_millis(100)).await.unwrap();

    let short = consumer.pull().await.unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;

    let stats = service.stats().await.unwrap();
    assert_eq!(stats.expired, 1);
    assert_eq!(stats.in_flight, 1);

    assert!(!consumer.delete(short.token).await);
    assert!(consumer.delete(long.token).await);
}

#[tokio::test]
async fn shutdown_wakes_blocked_consumers() {
    let service = QueueService::in_memory(config(500)).await.unwrap();
    let consumer = service.consumer();

    let blocked = tokio::spawn(async move { consumer.pull().await });

    tokio::time::sleep(Duration::from_millis(50)).await;

    service.shutdown();

    let err = to_queue_error(blocked.await.unwrap().unwrap_err());
    assert_eq!(err.kind, ErrorKind::Closed);

    assert!(service.is_closed());

    let err = to_queue_error(service.push("too late").await.unwrap_err());
    assert_eq!(err.kind, ErrorKind::Closed);
}

#[tokio::test]
async fn queues_are_independent() {
    let one = QueueService::in_memory(config(500)).await.unwrap();
    let two = QueueService::in_memory(config(500)).await.unwrap();

    assert_eq!(one.push("x").await.unwrap(), 1);
    assert_eq!(two.push("y").await.unwrap(), 1);

    assert_eq!(one.stats().await.unwrap().visible, 1);
    assert_eq!(two.stats().await.unwrap().visible, 1);

    let delivery = two.consumer().pull().await.unwrap();
    assert_eq!(body(&delivery), "y");
}
