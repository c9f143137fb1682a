use std::path::Path;

use tonic::Request;

use common::job::TaskState;
use common::rpc::connect;
use common::rpc::proto::{DoneRequest, StatusRequest, TaskStatus};

pub async fn status(socket: &Path) -> anyhow::Result<()> {
    let mut client = connect(socket).await?;
    let status = client
        .status(Request::new(StatusRequest {}))
        .await?
        .into_inner();

    println!("[Status]");
    println!(
        "done: {}  assignments: {}  reassignments: {}  reports: {} accepted, {} ignored",
        status.done,
        status.assignments,
        status.reassignments,
        status.accepted_reports,
        status.ignored_reports
    );

    println!();
    println!("[Map tasks]");
    for task in &status.map_tasks {
        println!("{}  {}", format_task(task), task.input_file);
    }

    println!();
    println!("[Reduce tasks]");
    for task in &status.reduce_tasks {
        println!("{}", format_task(task));
    }

    Ok(())
}

/// Returns whether the job is done.
pub async fn done(socket: &Path) -> anyhow::Result<bool> {
    let mut client = connect(socket).await?;
    let done = client
        .done(Request::new(DoneRequest {}))
        .await?
        .into_inner()
        .done;

    println!("{}", done);
    Ok(done)
}

fn format_task(task: &TaskStatus) -> String {
    let state = TaskState::from(task.state());
    match state {
        TaskState::InProgress => format!(
            "{:>4}  {:<12} {} ({} ms)",
            task.task_id,
            state.to_string(),
            task.worker_id,
            task.elapsed_ms
        ),
        _ => format!("{:>4}  {}", task.task_id, state),
    }
}
