//! binary-gc: reclaims disk space held by unused agent binary versions.

use clap::Parser;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use binary_gc::{
    install_prometheus, shutdown_channel, Args, Config, GarbageCollectorBuilder,
    RecorderGcMetrics,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Parse command-line arguments
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug {
        Level::DEBUG
    } else if args.silent {
        Level::ERROR
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let once = args.once;
    let config = Config::from(args);
    info!(
        root = %config.root.display(),
        interval_secs = config.interval.as_secs(),
        pinned = config.pinned_versions.len(),
        dry_run = config.dry_run,
        "Binary garbage collector is starting"
    );

    if let Some(addr) = config.metrics_addr {
        install_prometheus(addr)?;
    }

    let collector = GarbageCollectorBuilder::new()
        .config(config)
        .metrics(Arc::new(RecorderGcMetrics::new()))
        .build()?;

    let (trigger, shutdown) = shutdown_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, finishing in-flight deletions");
            trigger.trigger();
        }
    });

    if once {
        let report = collector.collect_cycle(&shutdown).await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        collector.run(shutdown).await;
    }

    Ok(())
}
