//! The same producer and consumer game as the in-memory demo, with the messages kept in a
//! directory (the first argument, `leasemq-demo` by default). Stop it in the middle and run it
//! again: the unprocessed messages are delivered after the restart and the ids continue.
use anyhow::Result;
use leasemq::{Consumer, QueueConfig, QueueService};
use log::{error, info};
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

async fn produce(id: usize, service: QueueService, counter: Arc<AtomicU64>) -> leasemq::Result<()> {
    loop {
        let delay = rand::thread_rng().gen_range(0..10_000);
        tokio::time::sleep(Duration::from_millis(delay)).await;

        let index = counter.fetch_add(1, Ordering::SeqCst);
        let msg_id = service.push(index.to_string()).await?;

        println!("Producer {id} produced message: {index} (id {msg_id})");
    }
}

async fn consume(id: usize, consumer: Consumer) -> leasemq::Result<()> {
    loop {
        let delivery = consumer.pull().await?;
        let data = String::from_utf8_lossy(&delivery.payload).to_string();

        println!("Consumer {id} consuming message: {data}");

        let work = rand::thread_rng().gen_range(300..600);
        tokio::time::sleep(Duration::from_millis(work)).await;

        if consumer.delete(delivery.token).await {
            println!("Consumer {id} consumed message: {data}");
        } else {
            println!("Consumer {id} message timeout: {data}");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    leasemq::setup_logger();

    let dir = std::env::args().nth(1).unwrap_or_else(|| "leasemq-demo".to_string());
    let config = QueueConfig {
        visibility_timeout: Duration::from_millis(500),
    };
    let service = QueueService::file_based(&dir, config)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    let recovered = service.stats().await.map_err(|e| anyhow::anyhow!(e))?;
    info!("Found {} messages in {}, next id is {}", recovered.visible, dir, recovered.next_id);

    let counter = Arc::new(AtomicU64::new(recovered.next_id));

    for id in 0..5 {
        let (service, counter) = (service.clone(), counter.clone());

        tokio::spawn(async move {
            if let Err(e) = produce(id, service, counter).await {
                error!("Producer {} stopped {:?}", id, e);
            }
        });
    }

    tokio::time::sleep(Duration::from_secs(10)).await;

    for id in 0..5 {
        let consumer = service.consumer();

        tokio::spawn(async move {
            if let Err(e) = consume(id, consumer).await {
                error!("Consumer {} stopped {:?}", id, e);
            }
        });
    }

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(20)) => (),
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }

    let stats = service.stats().await.map_err(|e| anyhow::anyhow!(e))?;
    println!("{stats:?}");

    service.shutdown();

    Ok(())
}
