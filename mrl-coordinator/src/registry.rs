use std::collections::BTreeMap;

use tokio::time::Instant;

use common::job::{TaskKind, TaskState};
use common::Error;

use crate::jobs::{MapTask, ReduceTask, TaskId, TaskRef};
use crate::lease::{Lease, LeaseVendor};

/// Authoritative task state of one job.
///
/// Holds every map and reduce record plus the lease table. The lease
/// table is keyed by task, so a task has at most one current lease, and
/// a task is `InProgress` exactly when it has one.
#[derive(Debug)]
pub struct TaskRegistry {
    map_tasks: Vec<MapTask>,

    reduce_tasks: Vec<ReduceTask>,

    /// Current lease of every in-progress task.
    leases: BTreeMap<TaskRef, Lease>,

    /// Internal vendor for managing lease IDs.
    lease_vendor: LeaseVendor,
}

impl TaskRegistry {
    /// One map task per input file and `n_reduce` reduce tasks, all idle.
    pub fn new(input_files: Vec<String>, n_reduce: u32) -> Result<Self, Error> {
        if n_reduce == 0 {
            return Err(Error::Config("the reduce bucket count must be at least 1".into()));
        }
        let n_map = u32::try_from(input_files.len())
            .map_err(|_| Error::Config("too many input files".into()))?;

        let map_tasks = (0..n_map)
            .zip(input_files)
            .map(|(id, file)| MapTask::new(id, file))
            .collect();
        let reduce_tasks = (0..n_reduce).map(ReduceTask::new).collect();

        Ok(Self {
            map_tasks,
            reduce_tasks,
            leases: BTreeMap::new(),
            lease_vendor: LeaseVendor::new(),
        })
    }

    pub fn n_map(&self) -> u32 {
        self.map_tasks.len() as u32
    }

    pub fn n_reduce(&self) -> u32 {
        self.reduce_tasks.len() as u32
    }

    pub fn map_tasks(&self) -> &[MapTask] {
        &self.map_tasks
    }

    pub fn reduce_tasks(&self) -> &[ReduceTask] {
        &self.reduce_tasks
    }

    pub fn map_task(&self, id: TaskId) -> Option<&MapTask> {
        self.map_tasks.get(id as usize)
    }

    /// Whether `task` names a record of this job.
    pub fn contains(&self, task: TaskRef) -> bool {
        match task.kind {
            TaskKind::Map => (task.id as usize) < self.map_tasks.len(),
            TaskKind::Reduce => (task.id as usize) < self.reduce_tasks.len(),
        }
    }

    pub fn state(&self, task: TaskRef) -> Option<TaskState> {
        match task.kind {
            TaskKind::Map => self.map_tasks.get(task.id as usize).map(|t| t.state),
            TaskKind::Reduce => self.reduce_tasks.get(task.id as usize).map(|t| t.state),
        }
    }

    fn state_mut(&mut self, task: TaskRef) -> Option<&mut TaskState> {
        match task.kind {
            TaskKind::Map => self.map_tasks.get_mut(task.id as usize).map(|t| &mut t.state),
            TaskKind::Reduce => self
                .reduce_tasks
                .get_mut(task.id as usize)
                .map(|t| &mut t.state),
        }
    }

    pub fn lease(&self, task: TaskRef) -> Option<&Lease> {
        self.leases.get(&task)
    }

    /// Every current lease, in task order.
    pub fn leases(&self) -> impl Iterator<Item = (&TaskRef, &Lease)> {
        self.leases.iter()
    }

    /// Lowest-numbered idle task of the given kind.
    pub fn first_idle(&self, kind: TaskKind) -> Option<TaskId> {
        match kind {
            TaskKind::Map => self
                .map_tasks
                .iter()
                .find(|t| t.state == TaskState::Idle)
                .map(|t| t.id),
            TaskKind::Reduce => self
                .reduce_tasks
                .iter()
                .find(|t| t.state == TaskState::Idle)
                .map(|t| t.id),
        }
    }

    /// Every map task has completed; reduce work may start.
    pub fn maps_completed(&self) -> bool {
        self.map_tasks
            .iter()
            .all(|t| t.state == TaskState::Completed)
    }

    /// Every reduce task has completed; the job is over.
    pub fn done(&self) -> bool {
        self.reduce_tasks
            .iter()
            .all(|t| t.state == TaskState::Completed)
    }

    /// Move an idle task to `InProgress` under a fresh lease.
    pub fn grant(&mut self, task: TaskRef, worker_id: &str, now: Instant) -> Result<&Lease, Error> {
        match self.state(task) {
            Some(TaskState::Idle) => {}
            Some(state) => {
                return Err(Error::SchedulerInvariantViolation(format!(
                    "cannot assign {} while it is {}",
                    task, state
                )))
            }
            None => return Err(Error::InvalidTaskReference { kind: task.kind, id: task.id }),
        }

        let lease = self.lease_vendor.issue(worker_id, now);
        if let Some(state) = self.state_mut(task) {
            *state = TaskState::InProgress;
        }
        Ok(self.leases.entry(task).or_insert(lease))
    }

    /// Drop the lease of an in-progress task and make it assignable again.
    pub fn revoke(&mut self, task: TaskRef) -> Option<Lease> {
        let lease = self.leases.remove(&task)?;
        if let Some(state) = self.state_mut(task) {
            *state = TaskState::Idle;
        }
        Some(lease)
    }

    /// Mark an in-progress task completed and release its lease.
    pub fn complete(&mut self, task: TaskRef, produced_buckets: Vec<u32>) -> Option<Lease> {
        let lease = self.leases.remove(&task)?;
        match task.kind {
            TaskKind::Map => {
                let record = &mut self.map_tasks[task.id as usize];
                record.state = TaskState::Completed;
                record.produced_buckets = produced_buckets;
            }
            TaskKind::Reduce => {
                self.reduce_tasks[task.id as usize].state = TaskState::Completed;
            }
        }
        Some(lease)
    }

    /// Check the structural invariants: in-progress exactly when leased,
    /// and no reduce work before every map completed.
    #[cfg(test)]
    pub fn check_invariants(&self) -> Result<(), String> {
        let all = self
            .map_tasks
            .iter()
            .map(|t| (TaskRef::map(t.id), t.state))
            .chain(
                self.reduce_tasks
                    .iter()
                    .map(|t| (TaskRef::reduce(t.id), t.state)),
            );

        for (task, state) in all {
            let leased = self.leases.contains_key(&task);
            if leased != (state == TaskState::InProgress) {
                return Err(format!("{} is {} but leased={}", task, state, leased));
            }
        }

        let reduce_started = self
            .reduce_tasks
            .iter()
            .any(|t| t.state != TaskState::Idle);
        if reduce_started && !self.maps_completed() {
            return Err("reduce task left idle before every map task completed".into());
        }

        Ok(())
    }
}
