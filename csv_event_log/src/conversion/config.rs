//! Conversion configuration
//!
//! A [`CsvConversionConfig`] is constructed once (e.g., by an external
//! column-mapping UI), validated, and then passed to the conversion by shared
//! reference. The core never mutates it.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::errors::ConfigError;
use crate::utils::date_formats::is_valid_format;

///
/// Admissible attribute datatypes for converted columns
///
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum ColumnDatatype {
    /// String values
    #[default]
    Literal,
    /// 64-bit integer values
    Discrete,
    /// Double values
    Continuous,
    /// Date-time values
    Time,
    /// Boolean values
    Boolean,
}

///
/// What to do when a field value fails to coerce to its configured datatype
///
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ErrorHandlingMode {
    /// Abort the whole conversion on the first error (also makes unparseable
    /// sort-key timestamps fail the external sort)
    AbortOnError,
    /// Drop the whole trace the offending row belongs to
    OmitTrace,
    /// Drop the offending event, keep the rest of the trace
    OmitEvent,
    /// Keep going: store the raw value as a Literal fallback attribute and
    /// record the error
    #[default]
    BestEffort,
}

///
/// Character set of the source bytes
///
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Charset {
    /// UTF-8 (invalid sequences are replaced, not rejected)
    #[default]
    Utf8,
    /// ISO-8859-1, decoded byte-for-byte
    Latin1,
}

///
/// Low-level tokenizer options (separator, quoting, charset)
///
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CsvParsingOptions {
    /// Field separator byte (e.g., `b','` or `b';'`)
    pub separator: u8,
    /// Quote byte enclosing fields that contain separators or newlines
    pub quote: u8,
    /// Optional escape byte for embedded quotes; doubling the quote character
    /// is always supported
    pub escape: Option<u8>,
    /// Character set of the source bytes
    pub charset: Charset,
}

impl Default for CsvParsingOptions {
    fn default() -> Self {
        Self {
            separator: b',',
            quote: b'"',
            escape: None,
            charset: Charset::default(),
        }
    }
}

///
/// Tuning knobs of the external sorter
///
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SortOptions {
    /// Memory budget of the partition phase: maximum number of rows
    /// accumulated in memory before a sorted segment is flushed to disk
    pub max_rows_in_memory: usize,
    /// Maximum number of segments merged in one k-way merge; more segments
    /// are merged over multiple rounds
    pub max_merge_fan_in: usize,
    /// Interval at which the calling thread polls the background sort worker
    /// for completion and checks for cancellation
    pub poll_interval_ms: u64,
    /// Parent directory for the temporary segment namespace; defaults to the
    /// system temp directory
    ///
    /// Each sort instance creates (and exclusively owns) a fresh directory
    /// inside this parent.
    pub temp_dir: Option<PathBuf>,
}

impl Default for SortOptions {
    fn default() -> Self {
        Self {
            max_rows_in_memory: 100_000,
            max_merge_fan_in: 16,
            poll_interval_ms: 100,
            temp_dir: None,
        }
    }
}

///
/// Finalized column mapping and conversion behavior
///
/// Immutable once conversion starts: external configuration UIs produce this
/// value and hand it to the core as a single argument.
///
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CsvConversionConfig {
    /// Ordered list of case-identifier column names; their values joined with
    /// [`CASE_KEY_DELIMITER`](crate::event_log::constants::CASE_KEY_DELIMITER)
    /// form the composite case key (at least one required)
    pub case_columns: Vec<String>,
    /// Name of the column holding the event class (required)
    pub event_column: String,
    /// Name of the column holding the completion timestamp
    ///
    /// At least one of `completion_time_column` and `start_time_column` must be set.
    pub completion_time_column: Option<String>,
    /// Name of the column holding the start timestamp
    pub start_time_column: Option<String>,
    /// Explicit per-column datatype overrides, keyed by column index;
    /// unlisted columns default to [`ColumnDatatype::Literal`]
    pub datatype_overrides: HashMap<usize, ColumnDatatype>,
    /// Optional user-supplied strftime pattern tried before the standard
    /// format list (see [`STANDARD_DATE_FORMATS`](crate::utils::date_formats::STANDARD_DATE_FORMATS))
    pub time_format: Option<String>,
    /// Omit attributes whose raw value is literally `NULL` (any case);
    /// empty values are always omitted
    pub omit_null_values: bool,
    /// Error-handling mode, enforced consistently by the sorter's comparator
    /// and the conversion engine's per-field parsing
    pub error_mode: ErrorHandlingMode,
    /// Run the datatype inference & repair pass over the built log
    pub infer_datatypes: bool,
    /// Tokenizer options
    pub parsing: CsvParsingOptions,
    /// External sorter options
    pub sort: SortOptions,
}

impl CsvConversionConfig {
    /// Create a configuration with the given column mapping and default
    /// behavior (best-effort errors, datatype inference enabled)
    pub fn new<S: Into<String>>(
        case_columns: Vec<S>,
        event_column: S,
        completion_time_column: Option<S>,
        start_time_column: Option<S>,
    ) -> Self {
        Self {
            case_columns: case_columns.into_iter().map(|c| c.into()).collect(),
            event_column: event_column.into(),
            completion_time_column: completion_time_column.map(|c| c.into()),
            start_time_column: start_time_column.map(|c| c.into()),
            datatype_overrides: HashMap::new(),
            time_format: None,
            omit_null_values: false,
            error_mode: ErrorHandlingMode::default(),
            infer_datatypes: true,
            parsing: CsvParsingOptions::default(),
            sort: SortOptions::default(),
        }
    }

    ///
    /// Validate the configuration
    ///
    /// Fails if no case columns, no event column or no time column is set, or
    /// if the custom time-format pattern is syntactically invalid. Column
    /// names are resolved against the header separately, once the header has
    /// been read.
    ///
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.case_columns.is_empty() {
            return Err(ConfigError::NoCaseColumns);
        }
        if self.event_column.is_empty() {
            return Err(ConfigError::NoEventColumn);
        }
        if self.completion_time_column.is_none() && self.start_time_column.is_none() {
            return Err(ConfigError::NoTimeColumn);
        }
        if let Some(format) = &self.time_format {
            if !is_valid_format(format) {
                return Err(ConfigError::InvalidTimeFormat(format.clone()));
            }
        }
        Ok(())
    }

    ///
    /// Resolve the configured column names against the header row
    ///
    /// Fails with [`ConfigError::UnknownColumn`] if a configured column does
    /// not occur in the header.
    ///
    pub fn resolve(&self, header: &[String]) -> Result<ResolvedColumns, ConfigError> {
        let find = |name: &String| {
            header
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| ConfigError::UnknownColumn(name.clone()))
        };
        let case = self.case_columns.iter().map(find).collect::<Result<Vec<_>, _>>()?;
        let event = find(&self.event_column)?;
        let completion = self.completion_time_column.as_ref().map(find).transpose()?;
        let start = self.start_time_column.as_ref().map(find).transpose()?;

        let mut datatypes = vec![ColumnDatatype::Literal; header.len()];
        for (&index, &datatype) in &self.datatype_overrides {
            if index >= header.len() {
                return Err(ConfigError::ColumnIndexOutOfRange(index));
            }
            datatypes[index] = datatype;
        }

        let attribute_columns = (0..header.len())
            .filter(|i| {
                !case.contains(i) && *i != event && Some(*i) != completion && Some(*i) != start
            })
            .collect();

        Ok(ResolvedColumns {
            header: header.to_vec(),
            case,
            event,
            completion,
            start,
            datatypes,
            attribute_columns,
        })
    }
}

///
/// Column mapping resolved against a concrete header row
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumns {
    /// The header row the mapping was resolved against
    pub header: Vec<String>,
    /// Indices of the case-identifier columns, in configured order
    pub case: Vec<usize>,
    /// Index of the event-name column
    pub event: usize,
    /// Index of the completion-time column, if configured
    pub completion: Option<usize>,
    /// Index of the start-time column, if configured
    pub start: Option<usize>,
    /// Effective datatype per column (overrides applied, Literal elsewhere)
    pub datatypes: Vec<ColumnDatatype>,
    /// Indices of the columns converted into event attributes (i.e., all
    /// columns except case, event-name and time columns)
    pub attribute_columns: Vec<usize>,
}
