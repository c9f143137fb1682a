use anyhow::anyhow;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod args;
use args::Args;

use mrl_worker::MRWorker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let workload = workload::try_named(&args.workload).ok_or_else(|| {
        anyhow!(
            "the workload `{}` is not a known workload (try one of: {})",
            args.workload,
            workload::NAMES.join(", ")
        )
    })?;

    let worker = MRWorker::new(args.config(), workload);
    worker.run().await?;

    Ok(())
}
