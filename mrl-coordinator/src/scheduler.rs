//! The task-scheduling state machine.
//!
//! Every method here is synchronous and performs no I/O: callers take the
//! one registry lock, call in, release it, and only then log or touch the
//! network.

use std::time::Duration;

use tokio::time::Instant;

use common::job::{TaskKind, TaskState};
use common::Error;

use crate::jobs::{TaskId, TaskRef};
use crate::lease::{Lease, LeaseID, WorkerID};
use crate::registry::TaskRegistry;

/// Answer to a task request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    Map {
        task_id: TaskId,
        input_file: String,
        n_reduce: u32,
        lease_id: LeaseID,
    },
    Reduce {
        task_id: TaskId,
        n_map: u32,
        lease_id: LeaseID,
    },
    /// Nothing assignable right now, ask again later.
    Wait,
    /// Every reduce task has completed.
    Done,
}

/// What a completion report did to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// The task moved to `Completed`.
    Accepted,
    /// The reporter's lease is no longer the current one; nothing changed.
    Superseded,
    /// The task had already completed; nothing changed.
    Duplicate,
}

impl ReportOutcome {
    pub fn is_accepted(self) -> bool {
        matches!(self, ReportOutcome::Accepted)
    }
}

/// A completion report as received from a worker.
#[derive(Debug, Clone)]
pub struct Report {
    pub worker_id: WorkerID,
    pub task: TaskRef,
    pub lease_id: LeaseID,
    pub produced_buckets: Vec<u32>,
}

/// A lease the sweep took away from its holder.
#[derive(Debug, Clone)]
pub struct Expired {
    pub task: TaskRef,
    pub lease: Lease,
}

/// Running totals, for status output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub assignments: u64,
    pub reassignments: u64,
    pub accepted_reports: u64,
    pub ignored_reports: u64,
}

/// Point-in-time view of one task.
#[derive(Debug, Clone)]
pub struct TaskSnapshot {
    pub task: TaskRef,
    pub state: TaskState,
    pub input_file: Option<String>,
    pub worker_id: Option<WorkerID>,
    pub elapsed: Option<Duration>,
    pub produced_buckets: Vec<u32>,
}

/// Point-in-time view of the whole job.
#[derive(Debug, Clone)]
pub struct JobSnapshot {
    pub map_tasks: Vec<TaskSnapshot>,
    pub reduce_tasks: Vec<TaskSnapshot>,
    pub done: bool,
    pub counters: Counters,
}

#[derive(Debug)]
pub struct Scheduler {
    registry: TaskRegistry,

    /// How long a worker may hold a task before it is handed to someone
    /// else.
    lease_timeout: Duration,

    counters: Counters,
}

impl Scheduler {
    pub fn new(registry: TaskRegistry, lease_timeout: Duration) -> Self {
        Self {
            registry,
            lease_timeout,
            counters: Counters::default(),
        }
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn lease_timeout(&self) -> Duration {
        self.lease_timeout
    }

    /// Every reduce task has completed.
    pub fn done(&self) -> bool {
        self.registry.done()
    }

    /// Pick the next task for `worker_id`.
    ///
    /// Idle map tasks go out lowest id first. Reduce tasks are only
    /// considered once every map task has completed; until then a worker
    /// that finds no idle map task is told to wait.
    pub fn request_task(&mut self, worker_id: &str, now: Instant) -> Assignment {
        if self.registry.done() {
            return Assignment::Done;
        }

        let kind = if self.registry.maps_completed() {
            TaskKind::Reduce
        } else {
            TaskKind::Map
        };

        let Some(task_id) = self.registry.first_idle(kind) else {
            return Assignment::Wait;
        };

        let task = TaskRef { kind, id: task_id };
        let n_map = self.registry.n_map();
        let n_reduce = self.registry.n_reduce();
        let input_file = self
            .registry
            .map_task(task_id)
            .filter(|_| kind == TaskKind::Map)
            .map(|t| t.input_file.clone());

        let lease_id = match self.registry.grant(task, worker_id, now) {
            Ok(lease) => lease.id,
            // first_idle just returned this task, so it is idle.
            Err(_) => return Assignment::Wait,
        };
        self.counters.assignments += 1;

        match kind {
            TaskKind::Map => Assignment::Map {
                task_id,
                input_file: input_file.unwrap_or_default(),
                n_reduce,
                lease_id,
            },
            TaskKind::Reduce => Assignment::Reduce {
                task_id,
                n_map,
                lease_id,
            },
        }
    }

    /// Record that a worker finished a task.
    ///
    /// Only a report naming the task's current lease changes anything.
    /// Reports from superseded leases and repeated reports are accepted
    /// as no-ops. Ids outside the job, and buckets outside the job in a
    /// report that would otherwise be accepted, are rejected.
    pub fn report_complete(&mut self, report: Report) -> Result<ReportOutcome, Error> {
        let Report {
            worker_id,
            task,
            lease_id,
            produced_buckets,
        } = report;

        if !self.registry.contains(task) {
            return Err(Error::SchedulerInvariantViolation(format!(
                "{} is out of range ({} map, {} reduce tasks)",
                task,
                self.registry.n_map(),
                self.registry.n_reduce()
            )));
        }

        let outcome = match self.registry.state(task) {
            Some(TaskState::Completed) => ReportOutcome::Duplicate,
            Some(TaskState::InProgress)
                if self
                    .registry
                    .lease(task)
                    .is_some_and(|lease| lease.held_by(&worker_id, lease_id)) =>
            {
                let n_reduce = self.registry.n_reduce();
                if let Some(bucket) = produced_buckets.iter().find(|&&b| b >= n_reduce) {
                    return Err(Error::SchedulerInvariantViolation(format!(
                        "{} reported bucket {} of {}",
                        task, bucket, n_reduce
                    )));
                }
                let mut buckets = produced_buckets;
                buckets.sort_unstable();
                buckets.dedup();
                self.registry.complete(task, buckets);
                ReportOutcome::Accepted
            }
            _ => ReportOutcome::Superseded,
        };

        if outcome.is_accepted() {
            self.counters.accepted_reports += 1;
        } else {
            self.counters.ignored_reports += 1;
        }
        Ok(outcome)
    }

    /// Take back every lease older than the lease timeout. The tasks go
    /// back to `Idle` and the next request may hand them out again.
    pub fn sweep(&mut self, now: Instant) -> Vec<Expired> {
        let stale = self
            .registry
            .leases()
            .filter(|(_, lease)| lease.expired(now, self.lease_timeout))
            .map(|(task, _)| *task)
            .collect::<Vec<_>>();

        let expired = stale
            .into_iter()
            .filter_map(|task| {
                self.registry
                    .revoke(task)
                    .map(|lease| Expired { task, lease })
            })
            .collect::<Vec<_>>();

        self.counters.reassignments += expired.len() as u64;
        expired
    }

    pub fn snapshot(&self, now: Instant) -> JobSnapshot {
        let leased = |task: TaskRef| {
            let lease = self.registry.lease(task);
            (
                lease.map(|l| l.worker_id.clone()),
                lease.map(|l| l.elapsed(now)),
            )
        };

        let map_tasks = self
            .registry
            .map_tasks()
            .iter()
            .map(|t| {
                let task = TaskRef::map(t.id);
                let (worker_id, elapsed) = leased(task);
                TaskSnapshot {
                    task,
                    state: t.state,
                    input_file: Some(t.input_file.clone()),
                    worker_id,
                    elapsed,
                    produced_buckets: t.produced_buckets.clone(),
                }
            })
            .collect();

        let reduce_tasks = self
            .registry
            .reduce_tasks()
            .iter()
            .map(|t| {
                let task = TaskRef::reduce(t.id);
                let (worker_id, elapsed) = leased(task);
                TaskSnapshot {
                    task,
                    state: t.state,
                    input_file: None,
                    worker_id,
                    elapsed,
                    produced_buckets: Vec::new(),
                }
            })
            .collect();

        JobSnapshot {
            map_tasks,
            reduce_tasks,
            done: self.done(),
            counters: self.counters,
        }
    }
}
