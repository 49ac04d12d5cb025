mod config;

use clap::Parser;
use config::{Cli, Command, Config, Storage};
use leasemq::{Consumer, QueueService, Result};
use log::{info, warn};
use std::path::Path;
use std::time::Duration;
use tokio::signal;

async fn start_service(config: &Config, data_dir: Option<&Path>) -> Result<QueueService> {
    let queue_config = config.queue_config();

    match (data_dir, &config.storage) {
        (Some(dir), _) => QueueService::file_based(dir, queue_config).await,
        (None, Storage::File { path }) => QueueService::file_based(path, queue_config).await,
        (None, Storage::Memory) => {
            warn!("Memory storage is configured, nothing is kept after this command");

            QueueService::in_memory(queue_config).await
        }
    }
}

async fn push(service: &QueueService, payloads: Vec<String>) -> Result<()> {
    for payload in payloads {
        let id = service.push(payload).await?;

        println!("{id}");
    }

    Ok(())
}

/// Pull and delete messages one by one. A message whose lease expired before the delete stays in
/// the queue and is counted as not drained.
async fn drain(consumer: &Consumer, max: Option<usize>, idle: Duration) -> Result<usize> {
    let mut drained = 0usize;

    while max.map_or(true, |max| drained < max) {
        let Some(delivery) = consumer.pull_timeout(idle).await? else {
            break;
        };

        println!("{}\t{}", delivery.id, String::from_utf8_lossy(&delivery.payload));

        if consumer.delete(delivery.token).await {
            drained += 1;
        } else {
            warn!("Lease of message {} expired before delete", delivery.id);
        }
    }

    Ok(drained)
}

async fn follow(consumer: &Consumer) -> Result<usize> {
    let mut drained = 0usize;

    loop {
        tokio::select! {
            delivery = consumer.pull() => {
                let delivery = delivery?;

                println!("{}\t{}", delivery.id, String::from_utf8_lossy(&delivery.payload));

                if consumer.delete(delivery.token).await {
                    drained += 1;
                }
            }
            _ = signal::ctrl_c() => {
                return Ok(drained);
            }
        }
    }
}

#[tokio::main]
pub async fn main() -> Result<()> {
    #[cfg(feature = "tracing")]
    console_subscriber::init();

    leasemq::setup_logger();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::parse_config(path)?,
        None => Config::default(),
    };

    let service = start_service(&config, cli.data_dir.as_deref()).await?;

    let result = match cli.command {
        Command::Push { payloads } => push(&service, payloads).await,
        Command::Drain { max, idle_ms, follow: false } => {
            let drained = drain(&service.consumer(), max, Duration::from_millis(idle_ms)).await?;

            info!("Drained {} messages", drained);

            Ok(())
        }
        Command::Drain { follow: true, .. } => {
            let drained = follow(&service.consumer()).await?;

            info!("Drained {} messages", drained);

            Ok(())
        }
        Command::Stats => {
            let stats = service.stats().await?;

            println!("{}", serde_json::to_string_pretty(&stats)?);

            Ok(())
        }
    };

    service.shutdown();

    result
}
