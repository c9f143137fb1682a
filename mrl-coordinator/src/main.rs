mod args;

use args::Args;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use mrl_coordinator::JobCoordinator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let coordinator = JobCoordinator::new(args.into_config())?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("unable to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    };
    coordinator.serve(shutdown).await?;

    if coordinator.done().await {
        info!("job complete");
    } else {
        info!("stopped before the job completed");
    }
    Ok(())
}
