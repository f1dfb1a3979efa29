use anyhow::Result;
use clap::Parser;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};

use service_pool::config::Config;
use service_pool::pool::{MutationFn, ServicesPool};

#[derive(Parser)]
#[command(name = "service-pool")]
#[command(about = "Keep a live round-robin pool of discovered service instances")]
struct Args {
    #[arg(short, long, default_value = "config/service-pool.toml")]
    config: String,

    /// Override the configured log level with debug
    #[arg(short, long)]
    verbose: bool,

    /// Print the selected instance every N seconds (0 disables)
    #[arg(long, default_value_t = 10)]
    report_every: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::from_file_with_env(&args.config).await?;
    if args.verbose {
        config.logging.level = "service_pool=debug".to_string();
    }
    config.logging.init_tracing()?;

    info!(
        service = %config.pool.name,
        provider = %config.discovery.provider,
        "Starting service-pool"
    );

    let discovery = config.build_discovery()?;
    let pool = ServicesPool::new(config.pool_options(discovery, MutationFn::identity()));

    pool.set_on_new_disc_callback(|srv| {
        info!(id = %srv.id(), address = %srv.address(), "new service discovered");
        Ok(())
    });
    pool.set_on_disc_remove_callback(|srv| {
        info!(id = %srv.id(), "service removed");
    });
    pool.set_on_disc_completed_callback(|| {
        info!("first discovery completed");
    });

    pool.start(config.pool.health_checks)?;

    let report = report_loop(pool.clone(), args.report_every);

    tokio::select! {
        _ = report => {}
        result = signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("Failed to listen for CTRL+C: {}", e);
            }
            warn!("Received CTRL+C, shutting down gracefully...");
        }
    }

    pool.close()?;
    info!("service-pool shutdown complete");
    Ok(())
}

async fn report_loop(pool: ServicesPool, every: u64) {
    if every == 0 {
        return std::future::pending().await;
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(every));
    loop {
        ticker.tick().await;
        match pool.next_service() {
            Some(srv) => info!(
                healthy = pool.count(),
                id = %srv.id(),
                address = %srv.address(),
                "next service"
            ),
            None => warn!(service = %pool.name(), "no healthy service available"),
        }
    }
}
