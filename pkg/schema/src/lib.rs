use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Core domain types
// ---------------------------------------------------------------------------

/// One received telemetry entry. Keys keep their submission order.
pub type Record = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ---------------------------------------------------------------------------
// Batch metadata
// ---------------------------------------------------------------------------

pub const FOUNDATION_ID_KEY: &str = "FoundationId";
pub const COLLECTED_AT_KEY: &str = "CollectedAt";
pub const DATASET_KEY: &str = "Dataset";

/// Contents of a `metadata` file inside a collection archive.
///
/// Unknown fields are ignored; missing or `null` ones decode as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BatchMetadata {
    #[serde(rename = "CollectedAt", deserialize_with = "null_as_empty")]
    pub collected_at: String,
    #[serde(rename = "FoundationId", deserialize_with = "null_as_empty")]
    pub foundation_id: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl BatchMetadata {
    /// Builds the stored record for an archive entry located at `entry_path`.
    pub fn into_record(self, entry_path: &str) -> Record {
        let mut record = Record::new();
        record.insert(
            FOUNDATION_ID_KEY.to_string(),
            Value::String(self.foundation_id),
        );
        record.insert(
            COLLECTED_AT_KEY.to_string(),
            Value::String(self.collected_at),
        );
        record.insert(
            DATASET_KEY.to_string(),
            Value::String(dataset_for_entry(entry_path)),
        );
        record
    }
}

/// Returns the directory part of a slash separated archive path.
///
/// `opsmanager/metadata` yields `opsmanager`, a bare file name yields `.`,
/// and repeated or trailing separators are collapsed.
pub fn dataset_for_entry(entry_path: &str) -> String {
    let dir = match entry_path.rfind('/') {
        Some(idx) => &entry_path[..=idx],
        None => return ".".to_string(),
    };
    clean_path(dir)
}

fn clean_path(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else if !rooted {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}
