//! Conversion engine: sorted rows → log builder calls
//!
//! Consumes the fully sorted row stream and drives a
//! [`CsvConversionHandler`]: one trace per distinct case key, one or two
//! events per row. Rows of the same case are contiguous in the sorted stream
//! (guaranteed by the sorter), so case management is a plain key comparison;
//! a previously closed case is never reopened.

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::builder::CsvConversionHandler;
use super::config::{
    ColumnDatatype, CsvConversionConfig, ErrorHandlingMode, ResolvedColumns,
};
use super::errors::{ConversionError, FieldConversionError, SortError};
use super::progress::ConversionProgress;
use super::sort;
use super::sort_key::KeyedRow;
use super::tokenizer::CsvRowReader;
use crate::event_log::constants::CASE_KEY_DELIMITER;
use crate::event_log::AttributeValue;
use crate::utils::date_formats::parse_timestamp;

///
/// Summary of a completed (possibly best-effort) conversion
///
/// On best-effort completion the log is produced together with the list of
/// field values that were skipped or kept as Literal fallbacks.
///
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConversionReport {
    /// All field-level conversion errors encountered, in row order
    pub field_errors: Vec<FieldConversionError>,
}

impl ConversionReport {
    /// Number of field values that failed to coerce
    pub fn error_count(&self) -> usize {
        self.field_errors.len()
    }
}

/// Tolerant boolean parsing: `J`/`Y`/`T` (and their words) are true, `N`/`F`
/// (and their words) are false, otherwise the standard boolean literals apply
pub(crate) fn parse_tolerant_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "j" | "y" | "t" | "ja" | "yes" | "true" => Some(true),
        "n" | "f" | "no" | "nein" | "false" => Some(false),
        _ => None,
    }
}

/// Coerce a raw field value to the given datatype
pub(crate) fn coerce_value(
    raw: &str,
    datatype: ColumnDatatype,
    time_format: Option<&str>,
) -> Result<AttributeValue, ()> {
    match datatype {
        ColumnDatatype::Literal => Ok(AttributeValue::String(raw.to_string())),
        ColumnDatatype::Discrete => raw
            .trim()
            .parse::<i64>()
            .map(AttributeValue::Int)
            .map_err(|_| ()),
        ColumnDatatype::Continuous => raw
            .trim()
            .parse::<f64>()
            .map(AttributeValue::Float)
            .map_err(|_| ()),
        ColumnDatatype::Time => parse_timestamp(raw, time_format)
            .map(AttributeValue::Date)
            .ok_or(()),
        ColumnDatatype::Boolean => parse_tolerant_bool(raw)
            .map(AttributeValue::Boolean)
            .ok_or(()),
    }
}

fn parse_time_field(
    row: &KeyedRow,
    index: Option<usize>,
    columns: &ResolvedColumns,
    config: &CsvConversionConfig,
    row_errors: &mut Vec<FieldConversionError>,
) -> Option<DateTime<Utc>> {
    let index = index?;
    let raw = row.fields[index].trim();
    if raw.is_empty() {
        return None;
    }
    match parse_timestamp(raw, config.time_format.as_deref()) {
        Some(dt) => Some(dt),
        None => {
            row_errors.push(FieldConversionError {
                line: row.line,
                column: columns.header[index].clone(),
                raw_value: raw.to_string(),
                target: ColumnDatatype::Time,
            });
            None
        }
    }
}

///
/// Convert a sorted row stream into log builder calls
///
/// Assumes rows with identical case key are contiguous. Cancellation is
/// checked at case granularity.
///
pub(crate) fn convert_sorted_rows<H: CsvConversionHandler>(
    rows: impl Iterator<Item = Result<KeyedRow, SortError>>,
    handler: &mut H,
    columns: &ResolvedColumns,
    config: &CsvConversionConfig,
    progress: &(impl ConversionProgress + ?Sized),
) -> Result<ConversionReport, ConversionError> {
    let mut report = ConversionReport::default();
    let mut current_case: Option<String> = None;
    let mut dropped_case: Option<String> = None;

    for row in rows {
        let row = row?;
        let case_key = row.key.case_parts.iter().join(CASE_KEY_DELIMITER);

        // Remaining rows of a dropped trace are skipped
        if dropped_case.as_deref() == Some(case_key.as_str()) {
            continue;
        }

        if current_case.as_deref() != Some(case_key.as_str()) {
            // Case boundary: cancellation checkpoint
            if progress.is_cancelled() {
                return Err(ConversionError::Cancelled);
            }
            if let Some(previous) = current_case.take() {
                handler.end_trace(&previous);
                progress.increment();
            }
            handler.start_trace(&case_key);
            current_case = Some(case_key.clone());
        }

        let event_class = row.fields[columns.event].clone();

        let mut row_errors: Vec<FieldConversionError> = Vec::new();
        let completion_time =
            parse_time_field(&row, columns.completion, columns, config, &mut row_errors);
        let start_time = parse_time_field(&row, columns.start, columns, config, &mut row_errors);

        let mut attributes: Vec<(String, AttributeValue)> = Vec::new();
        for &index in &columns.attribute_columns {
            let raw = &row.fields[index];
            if raw.is_empty() || (config.omit_null_values && raw.eq_ignore_ascii_case("null")) {
                continue;
            }
            let datatype = columns.datatypes[index];
            match coerce_value(raw, datatype, config.time_format.as_deref()) {
                Ok(value) => attributes.push((columns.header[index].clone(), value)),
                Err(()) => {
                    row_errors.push(FieldConversionError {
                        line: row.line,
                        column: columns.header[index].clone(),
                        raw_value: raw.clone(),
                        target: datatype,
                    });
                    if config.error_mode == ErrorHandlingMode::BestEffort {
                        // Literal fallback keeps the raw value on the event
                        attributes
                            .push((columns.header[index].clone(), AttributeValue::String(raw.clone())));
                    }
                }
            }
        }

        if !row_errors.is_empty() {
            for error in &row_errors {
                progress.log(&error.to_string());
            }
            match config.error_mode {
                ErrorHandlingMode::AbortOnError => {
                    return Err(ConversionError::Field(row_errors.swap_remove(0)));
                }
                ErrorHandlingMode::OmitTrace => {
                    handler.abort_trace();
                    current_case = None;
                    dropped_case = Some(case_key);
                    report.field_errors.append(&mut row_errors);
                    continue;
                }
                ErrorHandlingMode::OmitEvent => {
                    report.field_errors.append(&mut row_errors);
                    continue;
                }
                ErrorHandlingMode::BestEffort => {
                    report.field_errors.append(&mut row_errors);
                }
            }
        }

        handler.start_event(&event_class, completion_time, start_time);
        for (name, value) in attributes {
            handler.start_attribute(&name, value);
            handler.end_attribute();
        }
        handler.end_event();
    }

    // Close the last open case
    if let Some(previous) = current_case.take() {
        handler.end_trace(&previous);
        progress.increment();
    }

    Ok(report)
}

///
/// Run the full pipeline: tokenize, externally sort, convert
///
/// The handler is taken by value; on any error (or cancellation) it is
/// dropped and no partially built log escapes.
///
pub fn convert_csv_log<H, R>(
    reader: R,
    config: &CsvConversionConfig,
    mut handler: H,
    progress: &(impl ConversionProgress + ?Sized),
    source: &str,
) -> Result<(H::Output, ConversionReport), ConversionError>
where
    H: CsvConversionHandler,
    R: std::io::BufRead + Send,
{
    config.validate()?;
    let mut rows = CsvRowReader::new(reader, config.parsing.clone());
    let header = rows.read_header()?;
    let columns = config.resolve(&header)?;

    handler.start_log(source);
    progress.log(&format!("Sorting '{source}' by case key and timestamp"));
    let sorted = sort::sort_rows(&mut rows, &columns, config, progress)?;
    progress.log("Sort complete, building log");
    let report = convert_sorted_rows(sorted, &mut handler, &columns, config, progress)?;
    Ok((handler.get_result(), report))
}
