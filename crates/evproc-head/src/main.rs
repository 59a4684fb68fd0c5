//! Binary entrypoint for an evproc processor.
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use evproc_head::{
    default_registry, serve_admin, telemetry, watched_queue, AdminState, DispatchMetrics, Head,
    ProcessorConfig,
};

#[tokio::main]
async fn main() {
    let config = ProcessorConfig::parse();
    telemetry::init_tracing(&config.log_level, config.json_logs);

    if let Err(e) = run(config).await {
        tracing::error!(error = %format!("{:#}", e), "processor stopped");
        std::process::exit(1);
    }
}

async fn run(config: ProcessorConfig) -> anyhow::Result<()> {
    let broker = config.broker()?;
    let metrics = Arc::new(DispatchMetrics::new().context("building metrics registry")?);

    let registry = default_registry(&config.name)?;
    tracing::info!(processor = %config.name, pipelines = ?registry.tags(), "registered pipelines");

    if let Some(addr) = config.admin_addr {
        let state = AdminState {
            processor: config.name.clone(),
            watched_queue: watched_queue(&config.name),
            metrics: Arc::clone(&metrics),
        };
        tokio::spawn(async move {
            if let Err(e) = serve_admin(addr, state).await {
                tracing::error!(error = %e, "admin endpoint failed");
            }
        });
    }

    let head = Head::new(
        config.name.clone(),
        config.environment(),
        config.mq_url.clone(),
        broker.clone(),
        registry,
    )
    .with_metrics(metrics);

    let (dispatcher, subscription) = head.start().await?;

    for message in config.load_replay().await? {
        broker.publish(subscription.queue(), message)?;
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "could not listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };
    let handled = dispatcher.watch(subscription, shutdown).await;
    tracing::info!(handled, "processor exiting");

    Ok(())
}
