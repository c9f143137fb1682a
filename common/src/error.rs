use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::job::TaskKind;

/// Everything that can go wrong in a coordinator or a worker.
///
/// Workers give up on the current attempt for any of these. The
/// coordinator only ever produces the reference and invariant variants,
/// and answers the offending call with an error status instead of
/// stopping.
#[derive(Error, Debug)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("rpc failed: {0}")]
    Rpc(#[from] tonic::Status),

    #[error("invalid task reference: {kind} task {id}")]
    InvalidTaskReference { kind: TaskKind, id: u32 },

    #[error("callback failed: {0:#}")]
    Callback(anyhow::Error),

    #[error("{}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("corrupt intermediate data in {} at line {line}", path.display())]
    Corrupt { path: PathBuf, line: usize },

    #[error("scheduler invariant violated: {0}")]
    SchedulerInvariantViolation(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Attach a path to an I/O error.
    pub fn fs(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Error {
        let path = path.into();
        move |source| Error::Filesystem { path, source }
    }
}

impl From<Error> for tonic::Status {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidTaskReference { .. } | Error::SchedulerInvariantViolation(_) => {
                tonic::Status::invalid_argument(err.to_string())
            }
            Error::Config(_) => tonic::Status::failed_precondition(err.to_string()),
            Error::Rpc(status) => status,
            _ => tonic::Status::internal(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
