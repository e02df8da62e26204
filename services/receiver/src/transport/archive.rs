use std::io::{self, Read};

use flate2::read::GzDecoder;
use schema::{BatchMetadata, Record};
use serde_json::Deserializer;
use tar::Archive;

use super::DecodeError;

const GZIP_ENCODING: &str = "gzip";
const METADATA_SUFFIX: &str = "metadata";

/// Extracts one record per `*metadata` regular file in a tar archive.
///
/// A `content_encoding` of exactly `gzip` decompresses the body first; any
/// other value reads it as a plain tar stream. Entries that are not regular
/// files or whose name does not end in `metadata` are skipped.
pub fn decode_metadata_archive(
    body: &[u8],
    content_encoding: Option<&str>,
) -> Result<Vec<Record>, DecodeError> {
    if content_encoding == Some(GZIP_ENCODING) {
        let tar_bytes = gunzip(body)?;
        read_metadata_entries(&tar_bytes)
    } else {
        read_metadata_entries(body)
    }
}

fn gunzip(body: &[u8]) -> Result<Vec<u8>, DecodeError> {
    if body.is_empty() {
        return Err(DecodeError::Gzip(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "empty gzip stream",
        )));
    }
    let mut out = Vec::new();
    GzDecoder::new(body)
        .read_to_end(&mut out)
        .map_err(DecodeError::Gzip)?;
    Ok(out)
}

fn read_metadata_entries(tar_bytes: &[u8]) -> Result<Vec<Record>, DecodeError> {
    let mut archive = Archive::new(tar_bytes);
    let mut records = Vec::new();
    for entry in archive.entries().map_err(DecodeError::Tar)? {
        let mut entry = entry.map_err(DecodeError::Tar)?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        if !path.ends_with(METADATA_SUFFIX) {
            continue;
        }

        let mut contents = Vec::new();
        entry
            .read_to_end(&mut contents)
            .map_err(DecodeError::Tar)?;
        let metadata = first_metadata_value(&contents, &path)?;
        records.push(metadata.into_record(&path));
    }
    Ok(records)
}

// Only the first JSON value of an entry is read; anything after it is ignored.
// A bare `null` reads as metadata with every field empty.
fn first_metadata_value(contents: &[u8], path: &str) -> Result<BatchMetadata, DecodeError> {
    match Deserializer::from_slice(contents)
        .into_iter::<Option<BatchMetadata>>()
        .next()
    {
        Some(Ok(metadata)) => Ok(metadata.unwrap_or_default()),
        Some(Err(source)) => Err(DecodeError::EntryMetadata {
            path: path.to_string(),
            source,
        }),
        None => Err(DecodeError::EmptyEntryMetadata {
            path: path.to_string(),
        }),
    }
}
