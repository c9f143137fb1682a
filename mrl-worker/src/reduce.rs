use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use common::codec;
use common::rpc::proto::ReduceAssignment;
use common::utils::{intermediate_name, output_name, write_atomic};
use common::{group_and_reduce, Error, KeyValue, Result, Workload};

/// Run one reduce attempt.
///
/// Collects bucket `task_id` from every map task, groups the pairs by key
/// and writes `mr-out-<task_id>` into `dir`. A partition file that does
/// not exist counts as empty.
pub fn perform_reduce(
    assignment: &ReduceAssignment,
    dir: &Path,
    workload: &Workload,
) -> Result<PathBuf> {
    let mut pairs = Vec::new();
    for map_id in 0..assignment.n_map {
        let path = dir.join(intermediate_name(map_id, assignment.task_id));
        read_partition(&path, &mut pairs)?;
    }
    debug!(
        "reduce task {}: {} pairs from {} map tasks",
        assignment.task_id,
        pairs.len(),
        assignment.n_map
    );

    let output = group_and_reduce(pairs, workload.reduce_fn)?;

    let path = dir.join(output_name(assignment.task_id));
    write_atomic(&path, &output)?;
    Ok(path)
}

fn read_partition(path: &Path, pairs: &mut Vec<KeyValue>) -> Result<()> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("{} is missing, treating it as empty", path.display());
            return Ok(());
        }
        Err(e) => return Err(Error::fs(path)(e)),
    };

    for (i, line) in contents.lines().enumerate() {
        let kv = codec::decode_line(line).ok_or_else(|| Error::Corrupt {
            path: path.to_path_buf(),
            line: i + 1,
        })?;
        pairs.push(kv);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use bytes::Bytes;

    fn unused(_kv: KeyValue) -> common::MapOutput {
        unreachable!()
    }

    fn join(_key: Bytes, values: Box<dyn Iterator<Item = Bytes> + '_>) -> anyhow::Result<Bytes> {
        let mut values = values
            .map(|v| String::from_utf8_lossy(&v).into_owned())
            .collect::<Vec<_>>();
        values.sort();
        Ok(Bytes::from(values.join(",")))
    }

    const WORKLOAD: Workload = Workload {
        map_fn: unused,
        reduce_fn: join,
    };

    fn write_partition(dir: &Path, map_id: u32, bucket: u32, pairs: &[(&str, &str)]) {
        let mut buf = String::new();
        for (k, v) in pairs {
            codec::encode_into(&KeyValue::new(k.to_string(), v.to_string()), &mut buf);
        }
        std::fs::write(dir.join(intermediate_name(map_id, bucket)), buf).unwrap();
    }

    fn assignment(task_id: u32, n_map: u32) -> ReduceAssignment {
        ReduceAssignment {
            task_id,
            n_map,
            lease_id: 1,
        }
    }

    #[test]
    fn merges_every_map_and_sorts_keys() {
        let dir = tempfile::tempdir().unwrap();
        write_partition(dir.path(), 0, 1, &[("pear", "a"), ("apple", "a")]);
        write_partition(dir.path(), 1, 1, &[("apple", "b"), ("two words", "b")]);
        // A different bucket must not be read.
        write_partition(dir.path(), 0, 0, &[("zzz", "x")]);

        let out = perform_reduce(&assignment(1, 2), dir.path(), &WORKLOAD).unwrap();

        assert_eq!(out, dir.path().join("mr-out-1"));
        assert_eq!(
            std::fs::read_to_string(out).unwrap(),
            "apple a,b\npear a\ntwo words b\n"
        );
    }

    #[test]
    fn missing_partitions_are_empty() {
        let dir = tempfile::tempdir().unwrap();
        write_partition(dir.path(), 2, 0, &[("k", "v")]);

        let out = perform_reduce(&assignment(0, 3), dir.path(), &WORKLOAD).unwrap();
        assert_eq!(std::fs::read_to_string(out).unwrap(), "k v\n");

        let out = perform_reduce(&assignment(5, 3), dir.path(), &WORKLOAD).unwrap();
        assert_eq!(std::fs::read_to_string(out).unwrap(), "");
    }

    #[test]
    fn corrupt_partition_aborts() {
        let dir = tempfile::tempdir().unwrap();
        write_partition(dir.path(), 0, 0, &[("k", "v")]);
        std::fs::write(
            dir.path().join(intermediate_name(1, 0)),
            "aw== dg==\nnot base64 at all\n",
        )
        .unwrap();

        let err = perform_reduce(&assignment(0, 2), dir.path(), &WORKLOAD).unwrap_err();
        match err {
            Error::Corrupt { path, line } => {
                assert!(path.ends_with("mr-1-0"));
                assert_eq!(line, 2);
            }
            other => panic!("expected corrupt data, got {other:?}"),
        }
        assert!(!dir.path().join(output_name(0)).exists());
    }
}
