use crate::helper::{body, config, drain, push_all};
use leasemq::error::to_queue_error;
use leasemq::{ErrorKind, QueueService};
use std::path::Path;
use std::time::Duration;

fn record_names(dir: &Path) -> Vec<u64> {
    let mut ids: Vec<u64> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|entry| entry.unwrap().file_name().to_str()?.parse().ok())
        .collect();

    ids.sort_unstable();
    ids
}

#[tokio::test]
async fn restart_brings_back_undeleted_messages() {
    let dir = tempfile::tempdir().unwrap();

    let service = QueueService::file_based(dir.path(), config(30_000)).await.unwrap();
    let consumer = service.consumer();

    let ids = push_all(&service, &["m1", "m2", "m3", "m4", "m5"]).await;
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);

    for _ in 0..2 {
        let delivery = consumer.pull().await.unwrap();
        assert!(consumer.delete(delivery.token).await);
    }

    // In flight when the service goes away, it must come back.
    let in_flight = consumer.pull().await.unwrap();
    assert_eq!(in_flight.id, 3);

    service.shutdown();

    let service = QueueService::file_based(dir.path(), config(30_000)).await.unwrap();
    let consumer = service.consumer();

    let stats = service.stats().await.unwrap();
    assert_eq!(stats.visible, 3);
    assert_eq!(stats.next_id, 6);

    let mut bodies = vec![];
    for _ in 0..3 {
        bodies.push(body(&consumer.pull().await.unwrap()));
    }
    assert_eq!(bodies, vec!["m3", "m4", "m5"]);

    assert_eq!(service.push("m6").await.unwrap(), 6);
}

#[tokio::test]
async fn records_on_disk_are_the_undeleted_messages() {
    let dir = tempfile::tempdir().unwrap();

    let service = QueueService::file_based(dir.path(), config(30_000)).await.unwrap();
    let consumer = service.consumer();

    push_all(&service, &["a", "b", "c", "d"]).await;

    assert_eq!(record_names(dir.path()), vec![1, 2, 3, 4]);

    for _ in 0..2 {
        let delivery = consumer.pull().await.unwrap();
        assert!(consumer.delete(delivery.token).await);
    }

    // The third one is only leased, its record stays.
    let _leased = consumer.pull().await.unwrap();

    assert_eq!(record_names(dir.path()), vec![3, 4]);
}

#[tokio::test]
async fn ids_are_not_reused_after_everything_is_deleted() {
    let dir = tempfile::tempdir().unwrap();

    let service = QueueService::file_based(dir.path(), config(30_000)).await.unwrap();

    push_all(&service, &["x", "y", "z"]).await;

    let drained = drain(&service.consumer(), Duration::from_millis(100)).await;
    assert_eq!(drained, vec!["x", "y", "z"]);
    assert!(record_names(dir.path()).is_empty());

    service.shutdown();

    let service = QueueService::file_based(dir.path(), config(30_000)).await.unwrap();

    assert_eq!(service.stats().await.unwrap().visible, 0);
    assert_eq!(service.push("w").await.unwrap(), 4);
}

#[tokio::test]
async fn expired_lease_is_redelivered_and_record_kept() {
    let dir = tempfile::tempdir().unwrap();

    let service = QueueService::file_based(dir.path(), config(100)).await.unwrap();
    let consumer = service.consumer();

    service.push("durable").await.unwrap();

    let first = consumer.pull().await.unwrap();

    tokio::time::sleep(Duration::from_millis(250)).await;

    assert!(!consumer.delete(first.token).await);
    assert_eq!(record_names(dir.path()), vec![1]);

    let second = consumer.pull().await.unwrap();

    assert_eq!(body(&second), "durable");
    assert!(consumer.delete(second.token).await);
    assert!(record_names(dir.path()).is_empty());
}

#[tokio::test]
async fn start_fails_when_the_store_is_not_a_directory() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("plain-file");

    std::fs::write(&file, b"not a queue").unwrap();

    let err = match QueueService::file_based(&file, config(100)).await {
        Ok(_) => panic!("a file cannot be a queue directory"),
        Err(e) => to_queue_error(e),
    };

    assert_eq!(err.kind, ErrorKind::Storage);
}

#[tokio::test]
async fn start_fails_when_the_stored_id_is_the_highest_possible() {
    let dir = tempfile::tempdir().unwrap();

    std::fs::write(dir.path().join(u64::MAX.to_string()), b"last one").unwrap();

    let err = match QueueService::file_based(dir.path(), config(100)).await {
        Ok(_) => panic!("no id is left for new messages"),
        Err(e) => to_queue_error(e),
    };

    assert_eq!(err.kind, ErrorKind::Storage);
}
