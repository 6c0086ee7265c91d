mod cli;
mod config;
mod duration;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use nodebeat::{
    JsonLinesSink, LatencyTracer, NetworkCollection, ProbeContext, ProbeScheduler,
    PublicAddressResolver, SourceAddress, TelemetrySink, shutdown_channel,
};
use tracing::{info, warn};

use crate::cli::Cli;
use crate::config::{Config, OutputKind};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_config(cli.config.as_ref()).context("failed to load configuration")?;
    cli.apply(&mut config);
    config.validate()?;

    if cli.print_config {
        print!("{config}");
        return Ok(());
    }

    logger::init_with_level(&config.log_level);
    run(config).await
}

async fn run(config: Config) -> anyhow::Result<()> {
    let collection = NetworkCollection::load(&config.nodes)
        .await
        .with_context(|| format!("failed to load node list {}", config.nodes.display()))?;
    info!("Active Testnet: {}", collection.network());
    info!("Node count: {}", collection.len());
    if collection.is_empty() {
        warn!("Node list is empty, every probe cycle will be a no-op");
    }

    let resolver = PublicAddressResolver::new(config.public_ip_url.clone())
        .context("failed to build public address resolver")?;
    let source = SourceAddress::new(resolver);
    let source_address =
        source.resolve().await.context("failed to resolve public source address")?.to_string();

    let tracer = LatencyTracer::new(config.budget()).context("failed to set up latency tracer")?;
    let context = ProbeContext::new(Arc::new(tracer), collection.network(), source_address)
        .with_tls(config.tracer.use_tls);

    let sink: Box<dyn TelemetrySink> = match config.output.kind {
        OutputKind::Stdout => Box::new(JsonLinesSink::stdout()),
        OutputKind::File => Box::new(
            JsonLinesSink::append(&config.output.path)
                .await
                .with_context(|| format!("failed to open {}", config.output.path.display()))?,
        ),
    };

    let scheduler = ProbeScheduler::new(collection, context, sink).with_policy(config.policy());
    let (shutdown, signal) = shutdown_channel();
    let probe_loop = tokio::spawn(scheduler.run(config.period, signal));

    tokio::signal::ctrl_c().await.context("failed to listen for shutdown signal")?;
    info!("Received Ctrl+C, shutting down");
    shutdown.stop();

    let collection = probe_loop.await.context("probe loop terminated abnormally")?;
    for endpoint in &collection {
        if let Some(average) = endpoint.average_latency() {
            info!(
                "{} average latency: {:.2} ms over {} probes",
                endpoint.label(),
                average,
                endpoint.latencies().len()
            );
        }
    }

    Ok(())
}
