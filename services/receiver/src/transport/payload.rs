use schema::Record;
use serde_json::Deserializer;

use super::DecodeError;

/// Decodes back-to-back top-level JSON objects, e.g. `{"a":1}\n{"b":2}`.
///
/// An empty or whitespace-only body yields no records. Any value that is not
/// an object, or any syntax error, fails the whole body.
pub fn decode_json_stream(body: &[u8]) -> Result<Vec<Record>, DecodeError> {
    let mut records = Vec::new();
    for record in Deserializer::from_slice(body).into_iter::<Record>() {
        records.push(record?);
    }
    Ok(records)
}
