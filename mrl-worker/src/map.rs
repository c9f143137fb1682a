use std::path::Path;

use tracing::debug;

use common::codec;
use common::rpc::proto::MapAssignment;
use common::utils::{intermediate_name, write_atomic};
use common::{partition, Error, KeyValue, Result, Workload};

/// Run one map attempt.
///
/// Reads the whole input file, feeds it to the workload's map function
/// and writes one partition file per reduce bucket into `dir`, empty
/// buckets included. Returns the buckets that received at least one
/// pair.
pub fn perform_map(assignment: &MapAssignment, dir: &Path, workload: &Workload) -> Result<Vec<u32>> {
    let n_reduce = assignment.n_reduce;
    if n_reduce == 0 {
        return Err(Error::Config(format!(
            "map task {} was assigned with zero reduce buckets",
            assignment.task_id
        )));
    }

    let input = Path::new(&assignment.input_file);
    let contents = std::fs::read(input).map_err(Error::fs(input))?;
    debug!(
        "map task {}: read {} bytes from {}",
        assignment.task_id,
        contents.len(),
        input.display()
    );

    let pairs = (workload.map_fn)(KeyValue::new(assignment.input_file.clone(), contents))
        .map_err(Error::Callback)?;

    let mut buckets = vec![String::new(); n_reduce as usize];
    let mut emitted = 0usize;
    for kv in pairs {
        let kv = kv.map_err(Error::Callback)?;
        let bucket = partition(&kv.key, n_reduce);
        codec::encode_into(&kv, &mut buckets[bucket as usize]);
        emitted += 1;
    }

    let mut produced = Vec::new();
    for (bucket, contents) in (0..n_reduce).zip(&buckets) {
        let path = dir.join(intermediate_name(assignment.task_id, bucket));
        write_atomic(&path, contents.as_bytes())?;
        if !contents.is_empty() {
            produced.push(bucket);
        }
    }

    debug!(
        "map task {}: {} pairs into {} of {} buckets",
        assignment.task_id,
        emitted,
        produced.len(),
        n_reduce
    );
    Ok(produced)
}
