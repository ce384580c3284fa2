#![warn(
    clippy::doc_markdown,
    missing_debug_implementations,
    rust_2018_idioms,
    missing_docs
)]
#![doc = include_str!("../README.md")]

///
/// Event log model (traces, events, typed attributes)
///
pub mod event_log;

///
/// The CSV-to-event-log conversion pipeline (tokenizer, external sorter,
/// conversion engine, datatype repair)
///
pub mod conversion;

/// Util module with smaller helper functions, structs or enums
pub mod utils;

use std::fs::File;
use std::io::{BufRead, BufReader};

use flate2::bufread::GzDecoder;

#[doc(inline)]
pub use conversion::builder::{CsvConversionHandler, EventLogConversionHandler};

#[doc(inline)]
pub use conversion::config::{
    Charset, ColumnDatatype, CsvConversionConfig, CsvParsingOptions, ErrorHandlingMode,
    SortOptions,
};

#[doc(inline)]
pub use conversion::datatypes::{
    apply_attribute_types, infer_attribute_types, repair_attribute_datatypes, InferredType,
};

#[doc(inline)]
pub use conversion::engine::{convert_csv_log, ConversionReport};

#[doc(inline)]
pub use conversion::errors::{
    ConfigError, ConversionError, CsvParseError, DatatypeRepairError, FieldConversionError,
    SortError,
};

#[doc(inline)]
pub use conversion::progress::{ConversionProgress, NoOpProgress};

#[doc(inline)]
pub use conversion::tokenizer::CsvRowReader;

#[doc(inline)]
pub use event_log::event_log_struct::EventLog;

///
/// Result of a successful (possibly best-effort) CSV import
///
#[derive(Debug, Clone, PartialEq)]
pub struct CsvImportResult {
    /// The built event log
    pub log: EventLog,
    /// Field-level conversion errors encountered along the way
    pub report: ConversionReport,
}

fn import_with_source<R: BufRead + Send>(
    reader: R,
    config: &CsvConversionConfig,
    progress: &(impl ConversionProgress + ?Sized),
    source: &str,
) -> Result<CsvImportResult, ConversionError> {
    let (mut log, report) =
        convert_csv_log(reader, config, EventLogConversionHandler::new(), progress, source)?;
    if config.infer_datatypes {
        repair_attribute_datatypes(&mut log, config.time_format.as_deref(), progress)?;
    }
    Ok(CsvImportResult { log, report })
}

/// Convert delimited text from the given reader into an [`EventLog`]
pub fn import_csv_log<R: BufRead + Send>(
    reader: R,
    config: &CsvConversionConfig,
    progress: &(impl ConversionProgress + ?Sized),
) -> Result<CsvImportResult, ConversionError> {
    import_with_source(reader, config, progress, "CSV import")
}

///
/// Import an [`EventLog`] from a CSV file path
///
/// Paths ending in `.gz` are decompressed transparently.
///
pub fn import_csv_log_file(
    path: &str,
    config: &CsvConversionConfig,
    progress: &(impl ConversionProgress + ?Sized),
) -> Result<CsvImportResult, ConversionError> {
    if path.ends_with(".gz") {
        let file = File::open(path)?;
        let dec = GzDecoder::new(BufReader::new(file));
        let reader = BufReader::new(dec);
        import_with_source(reader, config, progress, path)
    } else {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        import_with_source(reader, config, progress, path)
    }
}

///
/// Import an [`EventLog`] from a byte slice (&\[u8\])
///
/// * `is_compressed_gz`: Parse the passed `data` as a compressed .gz archive
///
pub fn import_csv_log_slice(
    data: &[u8],
    is_compressed_gz: bool,
    config: &CsvConversionConfig,
    progress: &(impl ConversionProgress + ?Sized),
) -> Result<CsvImportResult, ConversionError> {
    if is_compressed_gz {
        let gz: GzDecoder<&[u8]> = GzDecoder::new(data);
        return import_with_source(BufReader::new(gz), config, progress, "CSV import");
    }
    import_with_source(data, config, progress, "CSV import")
}
