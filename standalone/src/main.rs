use std::path::PathBuf;

use anyhow::anyhow;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use common::utils::write_atomic;

/// Run a bundled workload sequentially, in one process.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Name of the workload.
    #[arg(short, long, default_value = "wc")]
    workload: String,

    /// Where to write the merged output.
    #[arg(short, long, default_value = "mr-out-0")]
    out: PathBuf,

    /// Input files.
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

fn main() -> anyhow::Result<()> {
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

    let output = standalone::run(&args.files, &workload)?;
    write_atomic(&args.out, &output)?;
    info!("wrote {} bytes to {}", output.len(), args.out.display());

    Ok(())
}
