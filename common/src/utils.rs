//! File naming convention and small filesystem helpers.
//!
//! Workers hand data to each other through the working directory, so the
//! names below are part of the contract between processes.

use std::io::Write;
use std::path::Path;

use anyhow::Context;
use atomicwrites::{AllowOverwrite, AtomicFile};
use bytes::Bytes;

use crate::{Error, Result};

/// Name of the partition written by map task `map_id` for bucket `bucket`.
pub fn intermediate_name(map_id: u32, bucket: u32) -> String {
    format!("mr-{}-{}", map_id, bucket)
}

/// Name of the final output of reduce task `reduce_id`.
pub fn output_name(reduce_id: u32) -> String {
    format!("mr-out-{}", reduce_id)
}

/// Write `contents` to `path` so that readers observe either the old file
/// or the complete new one, never a partial write.
///
/// The data goes to a temporary file next to `path` which is then renamed
/// over it. The last writer wins.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    AtomicFile::new(path, AllowOverwrite)
        .write(|f| f.write_all(contents))
        .map_err(|e| match e {
            atomicwrites::Error::Internal(e) | atomicwrites::Error::User(e) => e,
        })
        .map_err(Error::fs(path))
}

pub fn string_from_bytes(bytes: Bytes) -> anyhow::Result<String> {
    String::from_utf8(bytes.to_vec()).context("input is not valid UTF-8")
}
