//! Inverted index: which input files mention each word.

use std::collections::BTreeSet;

use anyhow::Result;
use bytes::Bytes;

use common::utils::string_from_bytes;
use common::{KeyValue, MapOutput};

/// Emits `(word, filename)` once per distinct word of the file.
pub fn map(kv: KeyValue) -> MapOutput {
    let contents = string_from_bytes(kv.value)?;
    let filename = kv.key;

    let words = contents
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
        .collect::<BTreeSet<_>>();

    let pairs = words
        .into_iter()
        .map(|w| Ok(KeyValue::new(w.to_string(), filename.clone())))
        .collect::<Vec<Result<KeyValue>>>();

    Ok(Box::new(pairs.into_iter()))
}

/// Returns `<count> <file,file,...>` with the files sorted.
pub fn reduce(_key: Bytes, values: Box<dyn Iterator<Item = Bytes> + '_>) -> Result<Bytes> {
    let mut files = values
        .map(string_from_bytes)
        .collect::<Result<Vec<_>>>()?;
    files.sort();
    files.dedup();

    Ok(Bytes::from(format!("{} {}", files.len(), files.join(","))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_pair_per_distinct_word() {
        let kv = KeyValue::new("doc", "the cat the hat");
        let pairs = map(kv).unwrap().map(|kv| kv.unwrap()).collect::<Vec<_>>();

        assert_eq!(pairs.len(), 3);
        assert!(pairs.iter().all(|kv| kv.value == "doc"));
    }

    #[test]
    fn files_are_sorted_and_counted() {
        let values = vec![Bytes::from("b.txt"), Bytes::from("a.txt")];
        let out = reduce(Bytes::from("cat"), Box::new(values.into_iter())).unwrap();
        assert_eq!(out, "2 a.txt,b.txt");
    }
}
