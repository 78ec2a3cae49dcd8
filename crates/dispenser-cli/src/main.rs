//! dispenser - run the batching dispenser or push tasks from the shell.

mod cli;
mod handlers;
mod logging;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};

use dispenser_core::{Dispenser, DispenserClient, QueueSpec, QueueStore, StoreSettings};
use dispenser_redis::RedisQueueStore;

use crate::cli::{AddArgs, Cli, Commands, CommonArgs, FileConfig, StartArgs};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = logging::init(
        &cli.common.log_level,
        cli.common.log_format,
        cli.common.log_file.as_deref(),
    )?;

    match cli.command {
        Commands::Start(args) => start(&cli.common, args).await,
        Commands::Add(args) => add(&cli.common, args).await,
    }
}

async fn connect(settings: &StoreSettings) -> Result<Arc<dyn QueueStore>> {
    let store = RedisQueueStore::connect(settings)
        .await
        .with_context(|| format!("cannot connect to redis at {}:{}", settings.host, settings.port))?;
    Ok(Arc::new(store))
}

async fn start(common: &CommonArgs, args: StartArgs) -> Result<()> {
    let file = FileConfig::load(common.config.as_deref())?;
    let mut config = file.dispenser;
    args.apply(&mut config);
    common.apply(&mut config.store);
    config.validate().context("invalid configuration")?;

    let store = connect(&config.store).await?;
    let registry = handlers::builtin_registry()?;
    let mut queues = Vec::new();
    for (queue, handler) in args.queue_handlers(&file.queues)? {
        let handler = handlers::resolve(&registry, &handler, &store)
            .with_context(|| format!("queue {queue}"))?;
        queues.push(QueueSpec::new(queue, handler));
    }

    info!(
        batch_size = config.batch_size,
        flush_interval = config.flush_interval,
        workers = config.workers,
        on_error = ?config.on_error,
        "Starting dispenser"
    );
    let dispenser = Dispenser::from_config(&config, queues, store)?;

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received");
                let _ = stop_tx.send(true);
            }
            Err(e) => warn!(error = %e, "Cannot listen for Ctrl-C"),
        }
    });

    dispenser.run(stop_rx).await.context("dispenser stopped")
}

async fn add(common: &CommonArgs, args: AddArgs) -> Result<()> {
    let file = FileConfig::load(common.config.as_deref())?;
    let mut settings = file.dispenser.store;
    common.apply(&mut settings);

    let payloads = args.payloads()?;
    let client = DispenserClient::new(connect(&settings).await?);
    for _ in 0..args.num {
        for (queue, value) in &payloads {
            let len = client
                .add(queue.as_str(), value)
                .await
                .with_context(|| format!("cannot add task to {queue}"))?;
            info!(queue = %queue, len, "Task added");
        }
    }
    Ok(())
}
