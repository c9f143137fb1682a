use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use common::rpc::coordinator_sock;
use mrl_coordinator::config::DEFAULT_DONE_GRACE;
use mrl_coordinator::CoordinatorConfig;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Input files, one map task each.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Number of reduce buckets.
    #[arg(short, long, default_value = "10")]
    pub n_reduce: u32,

    /// Seconds a worker may hold a task before it is reassigned.
    #[arg(short, long, default_value = "10")]
    pub lease_timeout_secs: u64,

    /// How often expired leases are looked for, in milliseconds.
    #[arg(long, default_value = "1000")]
    pub sweep_interval_ms: u64,

    /// Job name, used to pick a socket that does not clash with other jobs.
    #[arg(short, long)]
    pub job: Option<String>,

    /// Socket path. Overrides the one derived from the job name.
    #[arg(short, long)]
    pub socket: Option<PathBuf>,
}

impl Args {
    pub fn into_config(self) -> CoordinatorConfig {
        let socket = self
            .socket
            .unwrap_or_else(|| coordinator_sock(self.job.as_deref()));

        CoordinatorConfig {
            input_files: self.files,
            n_reduce: self.n_reduce,
            lease_timeout: Duration::from_secs(self.lease_timeout_secs),
            sweep_interval: Duration::from_millis(self.sweep_interval_ms),
            socket,
            done_grace: DEFAULT_DONE_GRACE,
        }
    }
}
