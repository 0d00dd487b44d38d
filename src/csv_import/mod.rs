//! Streaming, quote-aware CSV parsing for center and company uploads.
//!
//! Both parsers share the same two-tier failure model: a malformed quoted
//! field or truncated row is a parser-wide error (the whole upload is
//! rejected), while a row that merely fails field validation is recorded
//! as a per-row issue and the parser continues.

pub mod centers;
pub mod companies;

use csv::ReaderBuilder;
use std::collections::HashMap;

/// A single row-level validation failure, 1-indexed against the data rows
/// (the header row is row 0 and never appears here).
#[derive(Debug, Clone, serde::Serialize)]
pub struct CsvIssue {
    pub row_number: usize,
    pub reason: String,
}

/// Error raised when the whole upload must be rejected outright.
#[derive(Debug, thiserror::Error)]
pub enum CsvParseError {
    #[error("CSV is missing required header(s): {0}")]
    MissingHeaders(String),
    #[error("malformed CSV: {0}")]
    Malformed(String),
}

impl From<csv::Error> for CsvParseError {
    fn from(err: csv::Error) -> Self {
        CsvParseError::Malformed(err.to_string())
    }
}

/// True if `bytes` contains an odd number of double-quote characters. Every
/// `"` the CSV grammar recognizes — a field delimiter or an escaped `""`
/// inside a quoted field — occurs in pairs, so an odd count means some
/// quoted field was never closed. The `csv` crate itself does not treat
/// this as an error: it absorbs the rest of the input (commas, newlines
/// and all) into a single field instead.
fn has_unterminated_quote(bytes: &[u8]) -> bool {
    bytes.iter().filter(|&&b| b == b'"').count() % 2 == 1
}

/// Reads the header row of a CSV body (lowercased/trimmed) and leaves the
/// reader positioned at the first data row.
fn read_header_map(
    bytes: &[u8],
) -> Result<(csv::Reader<&[u8]>, HashMap<String, usize>), CsvParseError> {
    if has_unterminated_quote(bytes) {
        return Err(CsvParseError::Malformed(
            "unterminated quoted field".to_owned(),
        ));
    }

    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .has_headers(false)
        .from_reader(bytes);

    let header_record = {
        let mut records = reader.records();
        records
            .next()
            .transpose()?
            .unwrap_or_else(csv::StringRecord::new)
    };

    let mut map = HashMap::new();
    for (idx, raw) in header_record.iter().enumerate() {
        map.insert(raw.trim().to_lowercase(), idx);
    }

    Ok((reader, map))
}

fn missing_headers(map: &HashMap<String, usize>, required: &[&str]) -> Vec<String> {
    required
        .iter()
        .filter(|h| !map.contains_key(**h))
        .map(|h| (*h).to_owned())
        .collect()
}

fn field<'a>(record: &'a csv::StringRecord, map: &HashMap<String, usize>, name: &str) -> Option<&'a str> {
    map.get(name).and_then(|&idx| record.get(idx))
}
