//! Encoding and decoding of session partitions.
//!
//! The JSON form is a [`SessionDocument`]; the CSV form has one row per
//! record with columns in [`CSV_COLUMNS`] order and empty cells for nulls.
//! Decoding failures are reported as [`Error::CorruptData`] naming the file.

use super::types::SessionDocument;
use crate::record::RequestRecord;
use crate::{Error, Result};
use std::path::Path;

/// Column order of the tabular form
pub const CSV_COLUMNS: [&str; 15] = [
    "request_id",
    "url",
    "domain",
    "method",
    "resource_type",
    "mime_type",
    "start_time",
    "end_time",
    "status_code",
    "encoded_body_size",
    "duration_ms",
    "failed",
    "error_text",
    "session_id",
    "captured_at",
];

pub fn encode_json(document: &SessionDocument) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(document)?;
    bytes.push(b'\n');
    Ok(bytes)
}

pub fn encode_csv(records: &[RequestRecord]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    writer.write_record(CSV_COLUMNS)?;
    for record in records {
        writer.serialize(record)?;
    }

    writer.into_inner().map_err(|e| Error::Io(e.into_error()))
}

/// Decode the JSON form.
///
/// Accepts the session document as well as a bare array of records.
pub fn decode_json(bytes: &[u8], path: &Path) -> Result<Vec<RequestRecord>> {
    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| Error::corrupt(path, e))?;

    let records = if value.is_array() {
        serde_json::from_value::<Vec<RequestRecord>>(value).map_err(|e| Error::corrupt(path, e))?
    } else {
        serde_json::from_value::<SessionDocument>(value)
            .map_err(|e| Error::corrupt(path, e))?
            .records
    };

    validate_all(&records, path)?;
    Ok(records)
}

pub fn decode_csv(bytes: &[u8], path: &Path) -> Result<Vec<RequestRecord>> {
    let mut reader = csv::Reader::from_reader(bytes);

    let headers = reader.headers().map_err(|e| Error::corrupt(path, e))?;
    if headers.iter().ne(CSV_COLUMNS) {
        return Err(Error::corrupt(
            path,
            format!(
                "unexpected columns: {}",
                headers.iter().collect::<Vec<_>>().join(",")
            ),
        ));
    }

    let mut records = Vec::new();
    for (idx, row) in reader.deserialize::<RequestRecord>().enumerate() {
        let record = row.map_err(|e| Error::corrupt(path, format!("row {}: {}", idx + 1, e)))?;
        records.push(record);
    }

    validate_all(&records, path)?;
    Ok(records)
}

fn validate_all(records: &[RequestRecord], path: &Path) -> Result<()> {
    for record in records {
        record.validate().map_err(|reason| Error::corrupt(path, reason))?;
    }
    Ok(())
}
