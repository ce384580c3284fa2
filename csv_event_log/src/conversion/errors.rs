//! Error taxonomy of the conversion pipeline
//!
//! Configuration and structural errors abort the conversion and bubble up to
//! the caller; field-level errors are accumulated and reported through the
//! progress channel. Cancellation is a normal termination path, modeled as
//! [`ConversionError::Cancelled`] so callers can observe it as a control-flow
//! event without treating it as a failure.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use super::config::ColumnDatatype;

///
/// Error encountered while validating a [`CsvConversionConfig`](super::config::CsvConversionConfig)
///
/// Surfaced before any I/O happens.
///
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConfigError {
    /// No case-identifier columns were configured (at least one is required)
    NoCaseColumns,
    /// No event-name column was configured
    NoEventColumn,
    /// Neither a completion-time nor a start-time column was configured
    NoTimeColumn,
    /// The user-supplied time format pattern is syntactically invalid
    InvalidTimeFormat(String),
    /// A configured column name does not occur in the header
    UnknownColumn(String),
    /// A configured datatype override refers to a column index beyond the header width
    ColumnIndexOutOfRange(usize),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoCaseColumns => write!(f, "No case-identifier columns configured"),
            Self::NoEventColumn => write!(f, "No event-name column configured"),
            Self::NoTimeColumn => {
                write!(f, "Neither completion-time nor start-time column configured")
            }
            Self::InvalidTimeFormat(format) => {
                write!(f, "Invalid time format pattern: '{format}'")
            }
            Self::UnknownColumn(name) => write!(f, "Column '{name}' not found in header"),
            Self::ColumnIndexOutOfRange(index) => {
                write!(f, "Datatype override for column index {index} is out of range")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

///
/// Error encountered while tokenizing delimited text into rows
///
#[derive(Debug)]
pub enum CsvParseError {
    /// A quoted field was opened but never closed before the end of input
    UnterminatedQuote {
        /// Line number (1-based) on which the record started
        line: u64,
    },
    /// A data row has a different number of fields than the header
    FieldCountMismatch {
        /// Line number (1-based) on which the record started
        line: u64,
        /// Field count of the header
        expected: usize,
        /// Field count of the offending row
        got: usize,
    },
    /// The input ended before a header row could be read
    EmptyInput,
    /// IO error
    IoError(std::io::Error),
}

impl Display for CsvParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnterminatedQuote { line } => {
                write!(f, "Unterminated quoted field starting on line {line}")
            }
            Self::FieldCountMismatch {
                line,
                expected,
                got,
            } => write!(
                f,
                "Row on line {line} has {got} fields, expected {expected} (header width)"
            ),
            Self::EmptyInput => write!(f, "Input is empty, no header row found"),
            Self::IoError(e) => write!(f, "IO error while reading rows: {e}"),
        }
    }
}

impl std::error::Error for CsvParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CsvParseError {
    fn from(e: std::io::Error) -> Self {
        Self::IoError(e)
    }
}

///
/// Error encountered while externally sorting rows
///
/// Any [`SortError`] aborts the whole conversion; there are no partial results.
///
#[derive(Debug)]
pub enum SortError {
    /// Structural row malformation or tokenization failure in the source
    Parse(CsvParseError),
    /// A sort-key timestamp could not be parsed while the abort-on-error mode is active
    UnparseableSortTimestamp {
        /// Line number (1-based) of the offending row
        line: u64,
        /// The raw timestamp value
        value: String,
    },
    /// IO error on a temporary segment file
    IoError(std::io::Error),
    /// A temporary segment row could not be encoded or decoded
    SegmentEncoding(serde_json::Error),
    /// The background sort worker panicked
    WorkerPanic,
}

impl Display for SortError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "Sort aborted: {e}"),
            Self::UnparseableSortTimestamp { line, value } => {
                write!(f, "Unparseable sort-key timestamp '{value}' on line {line}")
            }
            Self::IoError(e) => write!(f, "IO error on temporary segment: {e}"),
            Self::SegmentEncoding(e) => write!(f, "Corrupt temporary segment encoding: {e}"),
            Self::WorkerPanic => write!(f, "Background sort worker panicked"),
        }
    }
}

impl std::error::Error for SortError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(e) => Some(e),
            Self::IoError(e) => Some(e),
            Self::SegmentEncoding(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CsvParseError> for SortError {
    fn from(e: CsvParseError) -> Self {
        Self::Parse(e)
    }
}

impl From<std::io::Error> for SortError {
    fn from(e: std::io::Error) -> Self {
        Self::IoError(e)
    }
}

impl From<serde_json::Error> for SortError {
    fn from(e: serde_json::Error) -> Self {
        Self::SegmentEncoding(e)
    }
}

///
/// A single attribute value that failed to coerce to its configured datatype
///
/// Recorded with line number and raw value; whether it aborts the conversion,
/// drops the trace/event or only leaves a Literal fallback depends on the
/// configured [`ErrorHandlingMode`](super::config::ErrorHandlingMode).
///
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldConversionError {
    /// Line number (1-based) of the offending row
    pub line: u64,
    /// Name of the offending column
    pub column: String,
    /// The raw field value that failed to coerce
    pub raw_value: String,
    /// The datatype the value was supposed to coerce to
    pub target: ColumnDatatype,
}

impl Display for FieldConversionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Value '{}' in column '{}' on line {} is not a valid {:?} value",
            self.raw_value, self.column, self.line, self.target
        )
    }
}

impl std::error::Error for FieldConversionError {}

///
/// Top-level error of a CSV-to-event-log conversion
///
#[derive(Debug)]
pub enum ConversionError {
    /// Invalid or incomplete conversion configuration
    Config(ConfigError),
    /// Row tokenization failed
    Parse(CsvParseError),
    /// The external sort failed
    Sort(SortError),
    /// A field failed to coerce while the abort-on-error mode is active
    Field(FieldConversionError),
    /// The datatype repair pass over the built log failed
    Repair(DatatypeRepairError),
    /// The operation was cancelled by the user
    ///
    /// Not an error: a normal early-termination signal. All temporary
    /// resources are cleaned up before this is returned.
    Cancelled,
    /// IO error
    IoError(std::io::Error),
}

impl Display for ConversionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(e) => write!(f, "Invalid conversion configuration: {e}"),
            Self::Parse(e) => write!(f, "Failed to read rows: {e}"),
            Self::Sort(e) => write!(f, "Failed to sort rows: {e}"),
            Self::Field(e) => write!(f, "Conversion aborted: {e}"),
            Self::Repair(e) => write!(f, "Failed to repair attribute datatypes: {e}"),
            Self::Cancelled => write!(f, "Conversion cancelled"),
            Self::IoError(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for ConversionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Parse(e) => Some(e),
            Self::Sort(e) => Some(e),
            Self::Field(e) => Some(e),
            Self::Repair(e) => Some(e),
            Self::IoError(e) => Some(e),
            Self::Cancelled => None,
        }
    }
}

impl ConversionError {
    /// Whether this is the user-initiated cancellation signal (as opposed to a failure)
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<ConfigError> for ConversionError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<CsvParseError> for ConversionError {
    fn from(e: CsvParseError) -> Self {
        Self::Parse(e)
    }
}

impl From<SortError> for ConversionError {
    fn from(e: SortError) -> Self {
        Self::Sort(e)
    }
}

impl From<std::io::Error> for ConversionError {
    fn from(e: std::io::Error) -> Self {
        Self::IoError(e)
    }
}

impl From<DatatypeRepairError> for ConversionError {
    fn from(e: DatatypeRepairError) -> Self {
        match e {
            DatatypeRepairError::Cancelled => Self::Cancelled,
            other => Self::Repair(other),
        }
    }
}

///
/// Error encountered while repairing attribute datatypes on a built log
///
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum DatatypeRepairError {
    /// A stored value could not be coerced to the resolved type of its key
    ///
    /// Fatal for the repair operation.
    CoercionFailed {
        /// Attribute key whose type was being unified
        key: String,
        /// String rendering of the value that failed to coerce
        value: String,
    },
    /// The repair was cancelled by the user (normal termination, not a failure)
    Cancelled,
}

impl Display for DatatypeRepairError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CoercionFailed { key, value } => write!(
                f,
                "Failed to coerce value '{value}' of attribute '{key}' to its resolved type"
            ),
            Self::Cancelled => write!(f, "Datatype repair cancelled"),
        }
    }
}

impl std::error::Error for DatatypeRepairError {}
