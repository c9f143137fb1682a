use std::fmt;

use crate::rpc::proto;

/// Which phase a task belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskKind {
    Map,
    Reduce,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Map => f.write_str("map"),
            TaskKind::Reduce => f.write_str("reduce"),
        }
    }
}

impl From<TaskKind> for proto::TaskKind {
    fn from(kind: TaskKind) -> Self {
        match kind {
            TaskKind::Map => proto::TaskKind::Map,
            TaskKind::Reduce => proto::TaskKind::Reduce,
        }
    }
}

impl TryFrom<i32> for TaskKind {
    type Error = i32;

    /// Decode the wire value. Unknown values and `UNSPECIFIED` are handed
    /// back unchanged.
    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match proto::TaskKind::try_from(value) {
            Ok(proto::TaskKind::Map) => Ok(TaskKind::Map),
            Ok(proto::TaskKind::Reduce) => Ok(TaskKind::Reduce),
            _ => Err(value),
        }
    }
}

/// Lifecycle of a single task.
///
/// `Idle -> InProgress` on assignment, `InProgress -> Completed` on a
/// valid report and `InProgress -> Idle` when the lease times out.
/// `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    InProgress,
    Completed,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Idle => f.write_str("idle"),
            TaskState::InProgress => f.write_str("in-progress"),
            TaskState::Completed => f.write_str("completed"),
        }
    }
}

impl From<TaskState> for proto::TaskState {
    fn from(state: TaskState) -> Self {
        match state {
            TaskState::Idle => proto::TaskState::Idle,
            TaskState::InProgress => proto::TaskState::InProgress,
            TaskState::Completed => proto::TaskState::Completed,
        }
    }
}

impl From<proto::TaskState> for TaskState {
    fn from(state: proto::TaskState) -> Self {
        match state {
            proto::TaskState::Idle => TaskState::Idle,
            proto::TaskState::InProgress => TaskState::InProgress,
            proto::TaskState::Completed => TaskState::Completed,
        }
    }
}
