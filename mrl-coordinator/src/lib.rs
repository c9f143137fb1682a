//! MapReduce coordinator: owns the task table of one job, hands tasks to
//! workers under time-bounded leases and serves the job over a UNIX
//! socket until every reduce task has completed.

pub mod config;
pub mod core;
pub mod jobs;
pub mod lease;
pub mod registry;
pub mod scheduler;

pub use crate::config::CoordinatorConfig;
pub use crate::core::{JobCoordinator, MRCoordinator};
