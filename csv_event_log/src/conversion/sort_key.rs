//! Composite sort keys for the external sorter
//!
//! Rows are ordered by their case-column values (lexicographically, in
//! configured order) with ties broken by the chronological order of the
//! parsed completion time. Keys are extracted eagerly when a row is read, so
//! the in-memory comparator itself is infallible; an unparseable completion
//! timestamp either degrades to the epoch or fails the sort, depending on the
//! error-handling mode.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::config::{CsvConversionConfig, ErrorHandlingMode, ResolvedColumns};
use super::errors::SortError;
use super::tokenizer::Row;
use crate::utils::date_formats::parse_timestamp;

///
/// Sort key of one row: case-column values, then completion time
///
/// The derived [`Ord`] gives exactly the required comparison: lexicographic
/// on the case parts, then chronological on the completion instant.
///
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct SortKey {
    /// Values of the configured case columns, in configured order
    pub case_parts: Vec<String>,
    /// Parsed completion time in epoch milliseconds; `0` (the epoch) when the
    /// completion column is absent, empty or unparseable in tolerant modes
    pub completion_millis: i64,
}

///
/// A row annotated with its extracted [`SortKey`]
///
/// This is the unit written to (and merged from) temporary segment files.
///
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeyedRow {
    /// Extracted sort key
    pub key: SortKey,
    /// Line number (1-based) of the row in the source, for error reporting
    pub line: u64,
    /// The row's field values
    pub fields: Vec<String>,
}

/// Total order over keyed rows: sort key first, remaining ties broken by the
/// full field sequence so the order is deterministic and independent of input
/// position
pub fn compare_rows(a: &KeyedRow, b: &KeyedRow) -> Ordering {
    a.key.cmp(&b.key).then_with(|| a.fields.cmp(&b.fields))
}

/// Extract the sort key of a row
///
/// In [`ErrorHandlingMode::AbortOnError`] an unparseable completion timestamp
/// fails the whole sort; in all other modes it degrades to the epoch.
pub fn extract_key(
    row: Row,
    columns: &ResolvedColumns,
    config: &CsvConversionConfig,
) -> Result<KeyedRow, SortError> {
    let case_parts = columns
        .case
        .iter()
        .map(|&i| row.fields[i].clone())
        .collect();

    let completion_millis = match columns.completion {
        Some(index) => {
            let raw = row.fields[index].trim();
            if raw.is_empty() {
                0
            } else {
                match parse_timestamp(raw, config.time_format.as_deref()) {
                    Some(dt) => dt.timestamp_millis(),
                    None if config.error_mode == ErrorHandlingMode::AbortOnError => {
                        return Err(SortError::UnparseableSortTimestamp {
                            line: row.line,
                            value: raw.to_string(),
                        });
                    }
                    None => 0,
                }
            }
        }
        None => 0,
    };

    Ok(KeyedRow {
        key: SortKey {
            case_parts,
            completion_millis,
        },
        line: row.line,
        fields: row.fields,
    })
}
