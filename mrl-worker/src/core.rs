use std::path::PathBuf;
use std::time::Duration;

use tokio::task::spawn_blocking;
use tonic::transport::Channel;
use tonic::{Request, Status};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use common::job::TaskKind;
use common::rpc::proto::task_response::Assignment;
use common::rpc::proto::{self, CompletionReport, MapAssignment, ReduceAssignment, TaskRequest};
use common::rpc::{self, coordinator_sock, CoordinatorClient};
use common::{Error, Result, Workload};

use crate::map::perform_map;
use crate::reduce::perform_reduce;

/// Default pause between task requests while the coordinator has nothing
/// to hand out.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Coordinator socket.
    pub socket: PathBuf,

    /// Where partition and output files are read and written.
    pub dir: PathBuf,

    /// Pause after a `Wait` reply.
    pub wait: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            socket: coordinator_sock(None),
            dir: PathBuf::from("."),
            wait: DEFAULT_WAIT,
        }
    }
}

/// What one worker got done before the job finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub maps: usize,
    pub reduces: usize,

    /// Reports the coordinator treated as stale or repeated.
    pub ignored: usize,
}

/// A single worker process: asks for a task, runs it, reports, repeats.
#[derive(Debug)]
pub struct MRWorker {
    id: String,
    config: WorkerConfig,
    workload: Workload,
}

impl MRWorker {
    pub fn new(config: WorkerConfig, workload: Workload) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            config,
            workload,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Work until the coordinator says the job is done.
    ///
    /// Any failure ends the run: the task being worked on is left to the
    /// coordinator's lease timeout.
    pub async fn run(&self) -> Result<RunSummary> {
        let mut client = rpc::connect(&self.config.socket).await?;
        info!("worker {} connected to {}", self.id, self.config.socket.display());

        let mut summary = RunSummary::default();
        loop {
            let response = client
                .request_task(Request::new(TaskRequest {
                    worker_id: self.id.clone(),
                }))
                .await?
                .into_inner();

            let report = match response.assignment {
                Some(Assignment::Map(task)) => {
                    summary.maps += 1;
                    self.map(task).await?
                }
                Some(Assignment::Reduce(task)) => {
                    summary.reduces += 1;
                    self.reduce(task).await?
                }
                Some(Assignment::Wait(_)) => {
                    debug!("nothing to do, waiting {:?}", self.config.wait);
                    tokio::time::sleep(self.config.wait).await;
                    continue;
                }
                Some(Assignment::Done(_)) => {
                    info!("worker {} finished: {:?}", self.id, summary);
                    return Ok(summary);
                }
                None => {
                    return Err(Error::Rpc(Status::internal(
                        "coordinator sent an empty assignment",
                    )))
                }
            };

            if !self.report(&mut client, report).await? {
                summary.ignored += 1;
            }
        }
    }

    async fn map(&self, task: MapAssignment) -> Result<CompletionReport> {
        info!("running map task {} on {}", task.task_id, task.input_file);
        let dir = self.config.dir.clone();
        let workload = self.workload;
        let (task, produced) = spawn_blocking(move || {
            let produced = perform_map(&task, &dir, &workload);
            (task, produced)
        })
        .await
        .map_err(|e| Error::Callback(e.into()))?;

        let produced_buckets = produced.inspect_err(|e| {
            error!("map task {} failed: {}", task.task_id, e);
        })?;

        Ok(CompletionReport {
            worker_id: self.id.clone(),
            kind: proto::TaskKind::from(TaskKind::Map) as i32,
            task_id: task.task_id,
            lease_id: task.lease_id,
            produced_buckets,
        })
    }

    async fn reduce(&self, task: ReduceAssignment) -> Result<CompletionReport> {
        info!("running reduce task {} over {} map outputs", task.task_id, task.n_map);
        let (task_id, lease_id) = (task.task_id, task.lease_id);
        let dir = self.config.dir.clone();
        let workload = self.workload;
        let output = spawn_blocking(move || perform_reduce(&task, &dir, &workload))
            .await
            .map_err(|e| Error::Callback(e.into()))?;

        let output = output.inspect_err(|e| {
            error!("reduce task {} failed: {}", task_id, e);
        })?;
        debug!("reduce task {} wrote {}", task_id, output.display());

        Ok(CompletionReport {
            worker_id: self.id.clone(),
            kind: proto::TaskKind::from(TaskKind::Reduce) as i32,
            task_id,
            lease_id,
            produced_buckets: Vec::new(),
        })
    }

    /// Send a completion report. Returns whether the coordinator took it.
    async fn report(
        &self,
        client: &mut CoordinatorClient<Channel>,
        report: CompletionReport,
    ) -> Result<bool> {
        let task_id = report.task_id;
        let accepted = client
            .report_complete(Request::new(report))
            .await?
            .into_inner()
            .accepted;

        if !accepted {
            warn!("report for task {} was not accepted; another attempt won", task_id);
        }
        Ok(accepted)
    }
}
