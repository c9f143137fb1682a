use std::future::Future;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UnixListener;
use tokio::sync::{watch, Mutex};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::wrappers::UnixListenerStream;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tonic::transport::Server;
use tonic::{Request, Response, Status};
use tracing::{debug, info, warn};

use common::job::TaskKind;
use common::rpc::proto::{
    self, task_response, CompletionAck, CompletionReport, DoneRequest, DoneResponse,
    MapAssignment, ReduceAssignment, StatusRequest, StatusResponse, TaskRequest, TaskResponse,
};
use common::rpc::{Coordinator, CoordinatorServer};
use common::{Error, Result};

use crate::config::CoordinatorConfig;
use crate::jobs::TaskRef;
use crate::registry::TaskRegistry;
use crate::scheduler::{
    Assignment, JobSnapshot, Report, ReportOutcome, Scheduler, TaskSnapshot,
};

impl From<Assignment> for TaskResponse {
    fn from(assignment: Assignment) -> Self {
        let assignment = match assignment {
            Assignment::Map {
                task_id,
                input_file,
                n_reduce,
                lease_id,
            } => task_response::Assignment::Map(MapAssignment {
                task_id,
                input_file,
                n_reduce,
                lease_id,
            }),
            Assignment::Reduce {
                task_id,
                n_map,
                lease_id,
            } => task_response::Assignment::Reduce(ReduceAssignment {
                task_id,
                n_map,
                lease_id,
            }),
            Assignment::Wait => task_response::Assignment::Wait(proto::Wait {}),
            Assignment::Done => task_response::Assignment::Done(proto::JobDone {}),
        };
        TaskResponse {
            assignment: Some(assignment),
        }
    }
}

impl From<TaskSnapshot> for proto::TaskStatus {
    fn from(task: TaskSnapshot) -> Self {
        proto::TaskStatus {
            task_id: task.task.id,
            state: proto::TaskState::from(task.state) as i32,
            worker_id: task.worker_id.unwrap_or_default(),
            elapsed_ms: task
                .elapsed
                .map(|d| d.as_millis() as u64)
                .unwrap_or_default(),
            input_file: task.input_file.unwrap_or_default(),
            produced_buckets: task.produced_buckets,
        }
    }
}

impl From<JobSnapshot> for StatusResponse {
    fn from(snapshot: JobSnapshot) -> Self {
        StatusResponse {
            map_tasks: snapshot.map_tasks.into_iter().map(Into::into).collect(),
            reduce_tasks: snapshot.reduce_tasks.into_iter().map(Into::into).collect(),
            done: snapshot.done,
            assignments: snapshot.counters.assignments,
            reassignments: snapshot.counters.reassignments,
            accepted_reports: snapshot.counters.accepted_reports,
            ignored_reports: snapshot.counters.ignored_reports,
        }
    }
}

/// The gRPC face of a job: hands out tasks and takes completion reports.
///
/// All handlers share one scheduler behind one lock. The lock is never
/// held across an await point other than its own acquisition, and nothing
/// is logged while it is held.
#[derive(Debug, Clone)]
pub struct MRCoordinator {
    scheduler: Arc<Mutex<Scheduler>>,
    done_tx: Arc<watch::Sender<bool>>,
}

#[tonic::async_trait]
impl Coordinator for MRCoordinator {
    async fn request_task(
        &self,
        request: Request<TaskRequest>,
    ) -> std::result::Result<Response<TaskResponse>, Status> {
        let TaskRequest { worker_id } = request.into_inner();

        let assignment = {
            let mut scheduler = self.scheduler.lock().await;
            scheduler.request_task(&worker_id, Instant::now())
        };

        match &assignment {
            Assignment::Map {
                task_id,
                input_file,
                lease_id,
                ..
            } => info!(
                "assigned map task {} ({}) to worker {} under lease {}",
                task_id, input_file, worker_id, lease_id
            ),
            Assignment::Reduce {
                task_id, lease_id, ..
            } => info!(
                "assigned reduce task {} to worker {} under lease {}",
                task_id, worker_id, lease_id
            ),
            Assignment::Wait => debug!("worker {} told to wait", worker_id),
            Assignment::Done => debug!("worker {} told the job is done", worker_id),
        }

        Ok(Response::new(assignment.into()))
    }

    async fn report_complete(
        &self,
        request: Request<CompletionReport>,
    ) -> std::result::Result<Response<CompletionAck>, Status> {
        let CompletionReport {
            worker_id,
            kind,
            task_id,
            lease_id,
            produced_buckets,
        } = request.into_inner();

        let kind = TaskKind::try_from(kind).map_err(|raw| {
            warn!("worker {} reported a task of unknown kind {}", worker_id, raw);
            Status::from(Error::SchedulerInvariantViolation(format!(
                "unknown task kind {}",
                raw
            )))
        })?;
        let task = TaskRef { kind, id: task_id };
        let report = Report {
            worker_id,
            task,
            lease_id,
            produced_buckets,
        };
        let worker_id = report.worker_id.clone();

        let (outcome, done) = {
            let mut scheduler = self.scheduler.lock().await;
            let outcome = scheduler.report_complete(report);
            (outcome, scheduler.done())
        };

        let outcome = outcome.map_err(|e| {
            warn!("rejected report from worker {}: {}", worker_id, e);
            Status::from(e)
        })?;

        match outcome {
            ReportOutcome::Accepted => info!("{} completed by worker {}", task, worker_id),
            ReportOutcome::Superseded => warn!(
                "ignored report for {} from worker {}: lease {} is no longer current",
                task, worker_id, lease_id
            ),
            ReportOutcome::Duplicate => {
                debug!("ignored repeated report for {} from worker {}", task, worker_id)
            }
        }

        if done {
            self.done_tx.send_if_modified(|was_done| {
                let changed = !*was_done;
                *was_done = true;
                changed
            });
        }

        Ok(Response::new(CompletionAck {
            accepted: outcome.is_accepted(),
        }))
    }

    async fn status(
        &self,
        _request: Request<StatusRequest>,
    ) -> std::result::Result<Response<StatusResponse>, Status> {
        let snapshot = {
            let scheduler = self.scheduler.lock().await;
            scheduler.snapshot(Instant::now())
        };
        Ok(Response::new(snapshot.into()))
    }

    async fn done(&self, _request: Request<DoneRequest>) -> std::result::Result<Response<DoneResponse>, Status> {
        let done = self.scheduler.lock().await.done();
        Ok(Response::new(DoneResponse { done }))
    }
}

/// A job and the server that runs it.
///
/// Cheap to clone. Every clone refers to the same scheduler, so a test
/// (or the binary) can keep one handle to query `done` while another
/// serves.
#[derive(Debug, Clone)]
pub struct JobCoordinator {
    config: CoordinatorConfig,
    service: MRCoordinator,
}

impl JobCoordinator {
    /// Build the task registry for `config`: one map task per input file
    /// and `n_reduce` reduce tasks, all idle.
    pub fn new(config: CoordinatorConfig) -> Result<Self> {
        if config.sweep_interval.is_zero() {
            return Err(Error::Config("the sweep interval must be positive".into()));
        }
        let registry = TaskRegistry::new(config.input_names(), config.n_reduce)?;
        let scheduler = Scheduler::new(registry, config.lease_timeout);
        let (done_tx, _) = watch::channel(false);

        Ok(Self {
            config,
            service: MRCoordinator {
                scheduler: Arc::new(Mutex::new(scheduler)),
                done_tx: Arc::new(done_tx),
            },
        })
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Whether every reduce task has completed.
    pub async fn done(&self) -> bool {
        self.service.scheduler.lock().await.done()
    }

    pub async fn status(&self) -> StatusResponse {
        let scheduler = self.service.scheduler.lock().await;
        scheduler.snapshot(Instant::now()).into()
    }

    /// Serve the job on the configured socket.
    ///
    /// Returns once the job is done and the grace period has passed, or
    /// as soon as `shutdown` resolves. The socket file is removed either
    /// way.
    pub async fn serve<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let socket = self.config.socket.as_path();
        remove_stale_socket(socket)?;
        let listener = UnixListener::bind(socket).map_err(Error::fs(socket))?;
        info!(
            "coordinator listening on {} ({} map tasks, {} reduce tasks)",
            socket.display(),
            self.config.input_files.len(),
            self.config.n_reduce
        );

        let token = CancellationToken::new();
        let tracker = TaskTracker::new();
        tracker.spawn(sweep_leases(
            self.service.scheduler.clone(),
            self.config.sweep_interval,
            token.clone(),
        ));
        tracker.close();

        let done_rx = self.service.done_tx.subscribe();
        let grace = self.config.done_grace;
        let stop = async move {
            tokio::select! {
                _ = shutdown => info!("shutdown requested"),
                _ = job_done(done_rx) => {
                    info!("job done, serving stragglers for {:?}", grace);
                    tokio::time::sleep(grace).await;
                }
            }
        };

        let served = Server::builder()
            .add_service(CoordinatorServer::new(self.service.clone()))
            .serve_with_incoming_shutdown(UnixListenerStream::new(listener), stop)
            .await;

        token.cancel();
        tracker.wait().await;
        if let Err(e) = std::fs::remove_file(socket) {
            debug!("could not remove {}: {}", socket.display(), e);
        }

        served?;
        info!("coordinator stopped");
        Ok(())
    }
}

fn remove_stale_socket(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!("removed stale socket {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::fs(path)(e)),
    }
}

/// Resolves once the job has been marked done.
async fn job_done(mut done_rx: watch::Receiver<bool>) {
    while !*done_rx.borrow_and_update() {
        if done_rx.changed().await.is_err() {
            // Sender gone: the job can no longer finish.
            std::future::pending::<()>().await;
        }
    }
}

/// Periodically take back leases that outlived the lease timeout.
pub async fn sweep_leases(
    scheduler: Arc<Mutex<Scheduler>>,
    every: Duration,
    token: CancellationToken,
) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = interval.tick() => {}
        }

        let expired = {
            let mut scheduler = scheduler.lock().await;
            scheduler.sweep(Instant::now())
        };

        for e in expired {
            warn!(
                "worker {} held {} for {:?} without reporting; reassigning",
                e.lease.worker_id,
                e.task,
                e.lease.elapsed(Instant::now())
            );
        }
    }
    debug!("lease sweep stopped");
}
