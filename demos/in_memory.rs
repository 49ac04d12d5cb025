//! Five producers push numbers at random times, after ten seconds five consumers start to process
//! them. Processing takes 300-600ms but the visibility timeout is 500ms, so some deletes come too
//! late and those messages are delivered again.
use anyhow::Result;
use leasemq::{Consumer, QueueConfig, QueueService};
use log::error;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

async fn produce(id: usize, service: QueueService, counter: Arc<AtomicU64>) -> leasemq::Result<()> {
    loop {
        let delay = rand::thread_rng().gen_range(0..10_000);
        tokio::time::sleep(Duration::from_millis(delay)).await;

        let index = counter.fetch_add(1, Ordering::SeqCst);
        service.push(index.to_string()).await?;

        println!("Producer {id} produced message: {index}");
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

    let config = QueueConfig {
        visibility_timeout: Duration::from_millis(500),
    };
    let service = QueueService::in_memory(config).await.map_err(|e| anyhow::anyhow!(e))?;
    let counter = Arc::new(AtomicU64::new(0));

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

    tokio::time::sleep(Duration::from_secs(20)).await;

    let stats = service.stats().await.map_err(|e| anyhow::anyhow!(e))?;
    println!("{stats:?}");

    service.shutdown();

    Ok(())
}
