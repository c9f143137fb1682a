//! Line format of intermediate partition files.
//!
//! Each pair is stored as `<key> <value>\n` with both halves base64
//! encoded (URL-safe alphabet), so keys and values may contain spaces or
//! newlines.

use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use bytes::Bytes;

use crate::KeyValue;

/// Append the encoded form of `kv` to `buf`, newline included.
pub fn encode_into(kv: &KeyValue, buf: &mut String) {
    URL_SAFE.encode_string(&kv.key, buf);
    buf.push(' ');
    URL_SAFE.encode_string(&kv.value, buf);
    buf.push('\n');
}

/// Decode one line (without its trailing newline). Returns `None` if the
/// line is not a valid encoded pair.
pub fn decode_line(line: &str) -> Option<KeyValue> {
    let (key, value) = line.split_once(' ')?;
    let key = URL_SAFE.decode(key).ok()?;
    let value = URL_SAFE.decode(value).ok()?;
    Some(KeyValue::new(Bytes::from(key), Bytes::from(value)))
}
