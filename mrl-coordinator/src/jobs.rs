use std::fmt;

use common::job::{TaskKind, TaskState};

pub type TaskId = u32;

/// Names one task of the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskRef {
    pub kind: TaskKind,
    pub id: TaskId,
}

impl TaskRef {
    pub fn map(id: TaskId) -> Self {
        Self {
            kind: TaskKind::Map,
            id,
        }
    }

    pub fn reduce(id: TaskId) -> Self {
        Self {
            kind: TaskKind::Reduce,
            id,
        }
    }
}

impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} task {}", self.kind, self.id)
    }
}

/// One map task per input file.
#[derive(Debug, Clone)]
pub struct MapTask {
    /// Position of the input file in the job's file list.
    pub id: TaskId,

    /// The input file, as given to the coordinator.
    pub input_file: String,

    pub state: TaskState,

    /// Buckets the completed attempt wrote pairs into.
    pub produced_buckets: Vec<u32>,
}

impl MapTask {
    pub fn new(id: TaskId, input_file: String) -> Self {
        Self {
            id,
            input_file,
            state: TaskState::Idle,
            produced_buckets: Vec::new(),
        }
    }
}

/// One reduce task per bucket.
#[derive(Debug, Clone)]
pub struct ReduceTask {
    pub id: TaskId,
    pub state: TaskState,
}

impl ReduceTask {
    pub fn new(id: TaskId) -> Self {
        Self {
            id,
            state: TaskState::Idle,
        }
    }
}
