//! A MapReduce-compatible application that computes the
//! degree of each vertex in a graph, given a list of edges.
//!

use anyhow::{anyhow, Result};
use bytes::Bytes;

use common::utils::string_from_bytes;
use common::{KeyValue, MapOutput};

fn parse_line(line: &str) -> Result<(u64, u64)> {
    let mut iter = line.split_whitespace().take(2);
    let a = iter
        .next()
        .ok_or_else(|| anyhow!("Invalid input file format"))?
        .parse()?;
    let b = iter
        .next()
        .ok_or_else(|| anyhow!("Invalid input file format"))?
        .parse()?;
    Ok((a, b))
}

pub fn map(kv: KeyValue) -> MapOutput {
    let s = string_from_bytes(kv.value)?;
    let edges = s
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_line)
        .collect::<Result<Vec<_>>>()?;

    let iter = edges.into_iter().flat_map(move |(a, b)| {
        [
            Ok::<_, anyhow::Error>(KeyValue::new(a.to_string(), Bytes::from_static(b"1"))),
            Ok(KeyValue::new(b.to_string(), Bytes::from_static(b"1"))),
        ]
    });
    Ok(Box::new(iter))
}

pub fn reduce(_key: Bytes, values: Box<dyn Iterator<Item = Bytes> + '_>) -> Result<Bytes> {
    let mut count = 0u64;

    for value in values {
        count += string_from_bytes(value)?.parse::<u64>()?;
    }

    Ok(Bytes::from(count.to_string()))
}
