//! Word count: how often does each word occur across all inputs.

use anyhow::Result;
use bytes::Bytes;

use common::utils::string_from_bytes;
use common::{KeyValue, MapOutput};

/// Emits `(word, "1")` for every maximal run of letters.
pub fn map(kv: KeyValue) -> MapOutput {
    let contents = string_from_bytes(kv.value)?;
    let words = contents
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
        .map(|w| Ok(KeyValue::new(w.to_string(), Bytes::from_static(b"1"))))
        .collect::<Vec<Result<KeyValue>>>();

    Ok(Box::new(words.into_iter()))
}

pub fn reduce(_key: Bytes, values: Box<dyn Iterator<Item = Bytes> + '_>) -> Result<Bytes> {
    Ok(Bytes::from(values.count().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_non_letters() {
        let kv = KeyValue::new("f", "a b,a\n\n c1d");
        let keys = map(kv)
            .unwrap()
            .map(|kv| kv.unwrap().key)
            .collect::<Vec<_>>();
        assert_eq!(keys, ["a", "b", "a", "c", "d"]);
    }

    #[test]
    fn counts_values() {
        let values = vec![Bytes::from("1"); 3];
        let out = reduce(Bytes::from("a"), Box::new(values.into_iter())).unwrap();
        assert_eq!(out, "3");
    }
}
