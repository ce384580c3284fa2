/// Log builder protocol and the default [`EventLogConversionHandler`](builder::EventLogConversionHandler)
pub mod builder;
/// Conversion configuration (column mapping, datatypes, error modes, sorter tuning)
pub mod config;
/// Attribute datatype inference & repair over a built log
pub mod datatypes;
/// Conversion engine driving the log builder from the sorted row stream
pub mod engine;
/// Error taxonomy of the conversion pipeline
pub mod errors;
/// Progress reporting and cooperative cancellation
pub mod progress;
/// External merge sort with compressed temporary segments
mod sort;
/// Composite sort keys (case columns, then completion time)
pub mod sort_key;
/// Streaming row tokenizer for delimited text
pub mod tokenizer;

#[cfg(test)]
mod tests;
