mod args;
use args::{Args, Commands};

mod core;

use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let socket = args.socket();

    match args.command {
        Commands::Status => core::status(&socket).await?,
        Commands::Done => {
            if !core::done(&socket).await? {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
