use std::path::PathBuf;
use std::time::Duration;

use common::rpc::coordinator_sock;

pub const DEFAULT_N_REDUCE: u32 = 10;
pub const DEFAULT_LEASE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// How long the server keeps answering after the job finished, so workers
/// still polling get a `Done` reply instead of a dead socket.
pub const DEFAULT_DONE_GRACE: Duration = Duration::from_secs(2);

/// Everything a coordinator needs to run one job.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// One map task per file, in this order.
    pub input_files: Vec<PathBuf>,

    /// Number of reduce buckets.
    pub n_reduce: u32,

    pub lease_timeout: Duration,

    pub sweep_interval: Duration,

    /// UNIX socket to listen on.
    pub socket: PathBuf,

    pub done_grace: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            input_files: Vec::new(),
            n_reduce: DEFAULT_N_REDUCE,
            lease_timeout: DEFAULT_LEASE_TIMEOUT,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            socket: coordinator_sock(None),
            done_grace: DEFAULT_DONE_GRACE,
        }
    }
}

impl CoordinatorConfig {
    pub fn new(input_files: Vec<PathBuf>, n_reduce: u32) -> Self {
        Self {
            input_files,
            n_reduce,
            ..Default::default()
        }
    }

    /// Input files as the strings handed to workers.
    pub fn input_names(&self) -> Vec<String> {
        self.input_files
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect()
    }
}
