use leasemq::{Consumer, Delivery, QueueConfig, QueueService};
use std::time::Duration;

pub(crate) fn config(visibility_timeout_ms: u64) -> QueueConfig {
    QueueConfig {
        visibility_timeout: Duration::from_millis(visibility_timeout_ms),
    }
}

/// Push the bodies one by one, returning the ids.
pub(crate) async fn push_all(service: &QueueService, bodies: &[&str]) -> Vec<u64> {
    let mut ids = vec![];

    for body in bodies {
        ids.push(service.push(body.to_string()).await.unwrap());
    }

    ids
}

pub(crate) fn body(delivery: &Delivery) -> String {
    String::from_utf8(delivery.payload.to_vec()).unwrap()
}

/// Pull and delete until no message arrives for `idle`, returning the acknowledged bodies.
pub(crate) async fn drain(consumer: &Consumer, idle: Duration) -> Vec<String> {
    let mut bodies = vec![];

    while let Some(delivery) = consumer.pull_timeout(idle).await.unwrap() {
        if consumer.delete(delivery.token).await {
            bodies.push(body(&delivery));
        }
    }

    bodies
}
