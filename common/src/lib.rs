//! Shared pieces of the mrl batch system: the callback signatures a
//! workload implements, key-value pairs, the partition hash, the on-disk
//! naming convention and the wire schema spoken between workers and the
//! coordinator.

use std::fmt;
use std::fmt::Formatter;
use std::hash::Hasher;

use bytes::{BufMut, Bytes, BytesMut};
use itertools::Itertools;

pub mod codec;
pub mod error;
pub mod job;
pub mod rpc;
pub mod utils;

pub use error::{Error, Result};

/////////////////////////////////////////////////////////////////////////////
// MapReduce application types
/////////////////////////////////////////////////////////////////////////////

/// The output of an application map function.
///
/// There are 2 layers of [`anyhow::Result`]s here. The outer layer
/// accounts for errors that arise while creating the iterator.
/// The inner layer accounts for errors that occur during iteration.
///
/// This accomodates both batch (all keys emitted at once) and lazy
/// (keys only emitted when the iterator is consumed) map operations.
pub type MapOutput = anyhow::Result<Box<dyn Iterator<Item = anyhow::Result<KeyValue>>>>;

/// A map function takes the input file name as the key and the file
/// contents as the value.
///
/// It returns an iterator that yields intermediate key-value pairs.
pub type MapFn = fn(kv: KeyValue) -> MapOutput;

/// A reduce function takes in a key and an iterator over every value
/// emitted for that key. It returns an [`anyhow::Result`] containing the
/// single value written next to the key in the output file.
pub type ReduceFn =
    fn(key: Bytes, values: Box<dyn Iterator<Item = Bytes> + '_>) -> anyhow::Result<Bytes>;

/// A map reduce application.
#[derive(Copy, Clone)]
pub struct Workload {
    pub map_fn: MapFn,
    pub reduce_fn: ReduceFn,
}

impl fmt::Debug for Workload {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workload").finish_non_exhaustive()
    }
}

/////////////////////////////////////////////////////////////////////////////
// Key-value pairs
/////////////////////////////////////////////////////////////////////////////

/// A single key-value pair.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct KeyValue {
    /// The key.
    pub key: Bytes,

    /// The value.
    pub value: Bytes,
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}",
            String::from_utf8_lossy(&self.key),
            String::from_utf8_lossy(&self.value)
        )
    }
}

impl KeyValue {
    /// Construct a new key-value pair from the given key and value.
    pub fn new(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Get the key of this key-value pair.
    ///
    /// This method is cheap, since [`Bytes`] are cheaply cloneable.
    #[inline]
    pub fn key(&self) -> Bytes {
        self.key.clone()
    }

    /// Get the value of this key-value pair.
    ///
    /// This method is cheap, since [`Bytes`] are cheaply cloneable.
    #[inline]
    pub fn value(&self) -> Bytes {
        self.value.clone()
    }

    /// Consumes the key-value pair and returns the key.
    #[inline]
    pub fn into_key(self) -> Bytes {
        self.key
    }

    /// Consumes the key-value pair and returns the value.
    #[inline]
    pub fn into_value(self) -> Bytes {
        self.value
    }
}

/////////////////////////////////////////////////////////////////////////////
// Partitioning and grouping
/////////////////////////////////////////////////////////////////////////////

/// Hashes an intermediate key. The hash only depends on the key bytes, so
/// every worker process routes a key the same way.
pub fn ihash(key: &[u8]) -> u32 {
    let mut hasher = fnv::FnvHasher::default();
    hasher.write(key);
    (hasher.finish() & 0x7fff_ffff) as u32
}

/// Compute the reduce bucket for a given key by calculating
/// `ihash(key) % n_reduce`.
///
/// `n_reduce` must be non-zero.
#[inline]
pub fn partition(key: &[u8], n_reduce: u32) -> u32 {
    ihash(key) % n_reduce
}

/// Sort `pairs` by key and call `reduce_fn` once per distinct key.
///
/// Returns the formatted output, one `<key> <result>` line per key in
/// increasing key order. The order of values sharing a key is whatever
/// order they arrived in.
pub fn group_and_reduce(mut pairs: Vec<KeyValue>, reduce_fn: ReduceFn) -> Result<Bytes> {
    pairs.sort_by(|a, b| a.key.cmp(&b.key));

    let mut out = BytesMut::new();
    for (key, group) in &pairs.into_iter().chunk_by(KeyValue::key) {
        let values = group.map(KeyValue::into_value);
        let result = reduce_fn(key.clone(), Box::new(values)).map_err(Error::Callback)?;

        out.put_slice(&key);
        out.put_u8(b' ');
        out.put_slice(&result);
        out.put_u8(b'\n');
    }

    Ok(out.freeze())
}
