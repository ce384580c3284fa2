/// Timestamp parsing against custom and standard date formats
pub mod date_formats;
