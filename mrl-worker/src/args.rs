use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use common::rpc::coordinator_sock;
use mrl_worker::WorkerConfig;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Name of the workload to run.
    #[arg(short, long, default_value = "wc")]
    pub workload: String,

    /// Directory for intermediate and output files.
    #[arg(short, long, default_value = ".")]
    pub dir: PathBuf,

    /// Job name, used to find the coordinator socket.
    #[arg(short, long)]
    pub job: Option<String>,

    /// Coordinator socket. Overrides the one derived from the job name.
    #[arg(short, long)]
    pub socket: Option<PathBuf>,

    /// Pause before asking again when there is nothing to do, in
    /// milliseconds.
    #[arg(long, default_value = "1000")]
    pub wait_ms: u64,
}

impl Args {
    pub fn config(&self) -> WorkerConfig {
        WorkerConfig {
            socket: self
                .socket
                .clone()
                .unwrap_or_else(|| coordinator_sock(self.job.as_deref())),
            dir: self.dir.clone(),
            wait: Duration::from_millis(self.wait_ms),
        }
    }
}
