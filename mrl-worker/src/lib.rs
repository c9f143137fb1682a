//! MapReduce worker: pulls tasks from the coordinator over its UNIX
//! socket and runs them against the local filesystem.

pub mod core;
pub mod map;
pub mod reduce;

pub use crate::core::{MRWorker, RunSummary, WorkerConfig};
