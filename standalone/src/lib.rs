//! Single-process MapReduce. Runs a workload over every input in order
//! and produces what the distributed run produces, merged into one file.
//! Used as the reference the cluster's output is checked against.

use std::path::Path;

use bytes::Bytes;
use tracing::debug;

use common::{group_and_reduce, Error, KeyValue, Result, Workload};

/// Map every file, then reduce every key. Returns the output lines
/// (`<key> <result>`, sorted by key).
pub fn run<P: AsRef<Path>>(files: &[P], workload: &Workload) -> Result<Bytes> {
    let mut pairs = Vec::new();

    for file in files {
        let path = file.as_ref();
        let contents = std::fs::read(path).map_err(Error::fs(path))?;
        let name = path.to_string_lossy().into_owned();

        let emitted = (workload.map_fn)(KeyValue::new(name, contents)).map_err(Error::Callback)?;
        let before = pairs.len();
        for kv in emitted {
            pairs.push(kv.map_err(Error::Callback)?);
        }
        debug!("{}: {} pairs", path.display(), pairs.len() - before);
    }

    group_and_reduce(pairs, workload.reduce_fn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_count_over_two_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        std::fs::write(&a, "a b a").unwrap();
        std::fs::write(&b, "b c").unwrap();

        let wc = workload::try_named("wc").unwrap();
        let out = run(&[a, b], &wc).unwrap();
        assert_eq!(&out[..], b"a 2\nb 2\nc 1\n");
    }

    #[test]
    fn missing_input_is_a_filesystem_error() {
        let dir = tempfile::tempdir().unwrap();
        let wc = workload::try_named("wc").unwrap();
        let err = run(&[dir.path().join("nope")], &wc).unwrap_err();
        assert!(matches!(err, Error::Filesystem { .. }));
    }
}
