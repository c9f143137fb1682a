use std::path::PathBuf;

use clap::{Parser, Subcommand};

use common::rpc::coordinator_sock;

//
// For parsing user specified command.
//
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Job name, used to find the coordinator socket.
    #[arg(short, long, global = true)]
    pub job: Option<String>,

    /// Coordinator socket. Overrides the one derived from the job name.
    #[arg(short, long, global = true)]
    pub socket: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show every task of the job, who holds it and for how long.
    Status,
    /// Print whether the job is done. Exits non-zero while it is not.
    Done,
}

impl Args {
    pub fn socket(&self) -> PathBuf {
        self.socket
            .clone()
            .unwrap_or_else(|| coordinator_sock(self.job.as_deref()))
    }
}
