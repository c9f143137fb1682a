//! End-to-end runs: a real coordinator on a UNIX socket in a scratch
//! directory, driven by real workers and by hand-rolled misbehaving ones.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tonic::Request;

use common::rpc::proto::{self, task_response::Assignment, CompletionReport, TaskRequest};
use common::utils::output_name;
use common::Error;
use mrl_coordinator::{CoordinatorConfig, JobCoordinator};
use mrl_worker::map::perform_map;
use mrl_worker::{MRWorker, WorkerConfig};

const LEASE_TIMEOUT: Duration = Duration::from_millis(600);
const SWEEP_INTERVAL: Duration = Duration::from_millis(50);
const WORKER_WAIT: Duration = Duration::from_millis(20);

struct Cluster {
    dir: TempDir,
    inputs: Vec<PathBuf>,
    n_reduce: u32,
    coordinator: JobCoordinator,
    server: JoinHandle<common::Result<()>>,
    shutdown: CancellationToken,
}

impl Cluster {
    async fn start(inputs: &[&str], n_reduce: u32) -> Cluster {
        let dir = tempfile::tempdir().unwrap();
        let inputs = inputs
            .iter()
            .enumerate()
            .map(|(i, contents)| {
                let path = dir.path().join(format!("pg-{i}.txt"));
                std::fs::write(&path, contents).unwrap();
                path
            })
            .collect::<Vec<_>>();

        let config = CoordinatorConfig {
            input_files: inputs.clone(),
            n_reduce,
            lease_timeout: LEASE_TIMEOUT,
            sweep_interval: SWEEP_INTERVAL,
            socket: dir.path().join("coordinator.sock"),
            done_grace: Duration::from_secs(2),
        };
        let coordinator = JobCoordinator::new(config).unwrap();

        let shutdown = CancellationToken::new();
        let server = {
            let coordinator = coordinator.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                coordinator
                    .serve(async move { shutdown.cancelled().await })
                    .await
            })
        };

        let socket = coordinator.config().socket.clone();
        for _ in 0..200 {
            if socket.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(socket.exists(), "coordinator never bound its socket");

        Cluster {
            dir,
            inputs,
            n_reduce,
            coordinator,
            server,
            shutdown,
        }
    }

    fn socket(&self) -> &Path {
        &self.coordinator.config().socket
    }

    fn worker(&self, workload: &str) -> MRWorker {
        let config = WorkerConfig {
            socket: self.socket().to_path_buf(),
            dir: self.dir.path().to_path_buf(),
            wait: WORKER_WAIT,
        };
        MRWorker::new(config, workload::try_named(workload).unwrap())
    }

    /// Every output line of the job, sorted.
    fn output_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for bucket in 0..self.n_reduce {
            let path = self.dir.path().join(output_name(bucket));
            let contents = std::fs::read_to_string(&path)
                .unwrap_or_else(|e| panic!("{}: {e}", path.display()));
            lines.extend(contents.lines().map(str::to_owned));
        }
        lines.sort();
        lines
    }

    /// Wait for the coordinator to stop on its own after the job is done.
    async fn finish(mut self) -> Self {
        let served = tokio::time::timeout(Duration::from_secs(10), &mut self.server)
            .await
            .expect("coordinator did not stop after the job finished");
        served.unwrap().unwrap();
        assert!(!self.socket().exists(), "socket file left behind");
        self
    }
}

fn sorted_lines(bytes: &[u8]) -> Vec<String> {
    let mut lines = String::from_utf8_lossy(bytes)
        .lines()
        .map(str::to_owned)
        .collect::<Vec<_>>();
    lines.sort();
    lines
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn word_count_over_two_files() {
    let cluster = Cluster::start(&["a b a", "b c"], 2).await;

    let summary = cluster.worker("wc").run().await.unwrap();
    assert_eq!(summary.maps, 2);
    assert_eq!(summary.reduces, 2);

    assert!(cluster.coordinator.done().await);
    assert_eq!(cluster.output_lines(), ["a 2", "b 2", "c 1"]);
    cluster.finish().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn empty_input_still_completes_every_reduce() {
    let cluster = Cluster::start(&[""], 3).await;

    let summary = cluster.worker("wc").run().await.unwrap();
    assert_eq!(summary.maps, 1);
    assert_eq!(summary.reduces, 3);

    for bucket in 0..3 {
        let out = cluster.dir.path().join(output_name(bucket));
        assert_eq!(std::fs::read(out).unwrap(), b"");
    }
    let status = cluster.coordinator.status().await;
    assert!(status.done);
    assert!(status.map_tasks[0].produced_buckets.is_empty());
    cluster.finish().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn crashed_reduce_worker_is_replaced() {
    let cluster = Cluster::start(&["x y z x"], 2).await;
    let wc = workload::try_named("wc").unwrap();

    // A worker that does the map, takes a reduce task and then dies.
    let mut ghost = common::rpc::connect(cluster.socket()).await.unwrap();
    let ask = || {
        Request::new(TaskRequest {
            worker_id: "ghost".into(),
        })
    };

    let Some(Assignment::Map(map)) = ghost.request_task(ask()).await.unwrap().into_inner().assignment
    else {
        panic!("expected the map task first");
    };
    let produced = perform_map(&map, cluster.dir.path(), &wc).unwrap();
    let ack = ghost
        .report_complete(Request::new(CompletionReport {
            worker_id: "ghost".into(),
            kind: proto::TaskKind::Map as i32,
            task_id: map.task_id,
            lease_id: map.lease_id,
            produced_buckets: produced,
        }))
        .await
        .unwrap();
    assert!(ack.into_inner().accepted);

    let Some(Assignment::Reduce(abandoned)) =
        ghost.request_task(ask()).await.unwrap().into_inner().assignment
    else {
        panic!("expected a reduce task after the only map completed");
    };
    assert_eq!(abandoned.task_id, 0);

    // A healthy worker picks up the other bucket, waits out the lease and
    // then redoes the abandoned one.
    let summary = cluster.worker("wc").run().await.unwrap();
    assert_eq!(summary.maps, 0);
    assert_eq!(summary.reduces, 2);
    assert_eq!(cluster.output_lines(), ["x 2", "y 1", "z 1"]);

    // The ghost comes back; its report changes nothing.
    let ack = ghost
        .report_complete(Request::new(CompletionReport {
            worker_id: "ghost".into(),
            kind: proto::TaskKind::Reduce as i32,
            task_id: abandoned.task_id,
            lease_id: abandoned.lease_id,
            produced_buckets: vec![],
        }))
        .await
        .unwrap();
    assert!(!ack.into_inner().accepted);

    let status = cluster.coordinator.status().await;
    assert!(status.done);
    assert_eq!(status.reassignments, 1);
    assert_eq!(status.accepted_reports, 3);
    assert_eq!(status.ignored_reports, 1);

    drop(ghost);
    cluster.finish().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn bad_reports_are_rejected_and_the_job_goes_on() {
    let cluster = Cluster::start(&["one two"], 1).await;
    let mut client = common::rpc::connect(cluster.socket()).await.unwrap();

    for (kind, task_id) in [
        (proto::TaskKind::Map as i32, 5),
        (proto::TaskKind::Unspecified as i32, 0),
        (77, 0),
    ] {
        let status = client
            .report_complete(Request::new(CompletionReport {
                worker_id: "confused".into(),
                kind,
                task_id,
                lease_id: 1,
                produced_buckets: vec![],
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
    }
    drop(client);

    cluster.worker("wc").run().await.unwrap();
    assert_eq!(cluster.output_lines(), ["one 1", "two 1"]);
    cluster.finish().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_workers_match_the_sequential_run() {
    let texts = [
        "It was the best of times, it was the worst of times",
        "it was the age of wisdom, it was the age of foolishness",
        "",
        "call me Ishmael. Some years ago, never mind how long precisely",
        "the the the THE The",
        "epoch of belief; epoch of incredulity; season of Light",
    ];

    for name in ["wc", "indexer"] {
        let cluster = Cluster::start(&texts, 3).await;

        let workers = (0..4)
            .map(|_| {
                let worker = cluster.worker(name);
                tokio::spawn(async move { worker.run().await })
            })
            .collect::<Vec<_>>();

        let mut maps = 0;
        let mut reduces = 0;
        for worker in workers {
            let summary = worker.await.unwrap().unwrap();
            maps += summary.maps;
            reduces += summary.reduces;
        }
        assert_eq!(maps, texts.len());
        assert_eq!(reduces, 3);

        let expected = standalone::run(&cluster.inputs, &workload::try_named(name).unwrap()).unwrap();
        assert_eq!(cluster.output_lines(), sorted_lines(&expected), "{name}");
        cluster.finish().await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn operator_shutdown_stops_an_unfinished_job() {
    let cluster = Cluster::start(&["never processed"], 1).await;
    assert!(!cluster.coordinator.done().await);

    cluster.shutdown.cancel();
    let cluster = cluster.finish().await;
    assert!(!cluster.coordinator.done().await);
}

#[tokio::test]
async fn worker_without_coordinator_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = WorkerConfig {
        socket: dir.path().join("nobody.sock"),
        dir: dir.path().to_path_buf(),
        wait: WORKER_WAIT,
    };
    let err = MRWorker::new(config, workload::try_named("wc").unwrap())
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
}
