use std::io::Write;

use chrono::{TimeZone, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;

use super::{base_config, event_activities, trace_id, RecordingProgress};
use crate::conversion::config::{ColumnDatatype, CsvConversionConfig, ErrorHandlingMode};
use crate::conversion::errors::{ConfigError, ConversionError};
use crate::conversion::progress::NoOpProgress;
use crate::event_log::constants::{
    INSTANCE_NAME, LIFECYCLE_COMPLETE, LIFECYCLE_NAME, LIFECYCLE_START, TIMESTAMP_NAME,
};
use crate::event_log::{AttributeValue, EditableAttributes};
use crate::{import_csv_log, import_csv_log_slice, CsvImportResult};

fn import(csv: &str, config: &CsvConversionConfig) -> Result<CsvImportResult, ConversionError> {
    import_csv_log(csv.as_bytes(), config, &NoOpProgress)
}

#[test]
fn test_groups_rows_into_cases() {
    let csv = "case,activity,timestamp\n\
               2,Register,2020-01-01 08:30:00\n\
               1,Register,2020-01-01 08:00:00\n\
               1,Review,2020-01-01 09:00:00\n\
               2,Review,2020-01-01 09:30:00\n\
               1,Decide,2020-01-01 10:00:00\n";
    let result = import(csv, &base_config()).unwrap();

    // Interleaved input, but each case becomes exactly one trace
    assert_eq!(result.log.traces.len(), 2);
    let ids: Vec<&str> = result.log.traces.iter().map(trace_id).collect();
    assert_eq!(ids, vec!["1", "2"]);
    assert_eq!(
        event_activities(&result.log.traces[0]),
        vec!["Register", "Review", "Decide"]
    );
    assert_eq!(
        event_activities(&result.log.traces[1]),
        vec!["Register", "Review"]
    );
    assert!(result.report.field_errors.is_empty());
}

#[test]
fn test_composite_case_key() {
    let mut config = base_config();
    config.case_columns = vec!["org".to_string(), "case".to_string()];
    let csv = "org,case,activity,timestamp\n\
               acme,1,Register,2020-01-01 08:00:00\n\
               acme,2,Register,2020-01-01 08:00:00\n";
    let result = import(csv, &config).unwrap();
    let ids: Vec<&str> = result.log.traces.iter().map(trace_id).collect();
    assert_eq!(ids, vec!["acme:1", "acme:2"]);
}

#[test]
fn test_start_complete_pairing() {
    let mut config = CsvConversionConfig::new(
        vec!["case"],
        "activity",
        Some("timestamp"),
        Some("start"),
    );
    config.infer_datatypes = false;
    let csv = "case,activity,timestamp,start\n\
               1,Review,2020-01-01 09:00:00,2020-01-01 08:00:00\n";
    let result = import(csv, &config).unwrap();

    let trace = &result.log.traces[0];
    assert_eq!(trace.events.len(), 2);

    let start_event = &trace.events[0];
    let complete_event = &trace.events[1];
    assert_eq!(
        start_event.attributes.get_by_key(LIFECYCLE_NAME).unwrap().value,
        AttributeValue::String(LIFECYCLE_START.to_string())
    );
    assert_eq!(
        complete_event.attributes.get_by_key(LIFECYCLE_NAME).unwrap().value,
        AttributeValue::String(LIFECYCLE_COMPLETE.to_string())
    );
    assert_eq!(
        start_event.timestamp().copied().unwrap(),
        Utc.with_ymd_and_hms(2020, 1, 1, 8, 0, 0).unwrap()
    );
    assert_eq!(
        complete_event.timestamp().copied().unwrap(),
        Utc.with_ymd_and_hms(2020, 1, 1, 9, 0, 0).unwrap()
    );
    // Both events share one generated instance id
    let start_instance = start_event.attributes.get_by_key(INSTANCE_NAME).unwrap();
    let complete_instance = complete_event.attributes.get_by_key(INSTANCE_NAME).unwrap();
    assert_eq!(start_instance.value, complete_instance.value);
    assert!(start_instance.value.try_as_uuid().is_some());
}

#[test]
fn test_single_timestamp_produces_one_untagged_event() {
    let mut config = CsvConversionConfig::new(
        vec!["case"],
        "activity",
        Some("timestamp"),
        Some("start"),
    );
    config.infer_datatypes = false;
    let csv = "case,activity,timestamp,start\n\
               1,Review,2020-01-01 09:00:00,\n";
    let result = import(csv, &config).unwrap();

    let trace = &result.log.traces[0];
    assert_eq!(trace.events.len(), 1);
    let event = &trace.events[0];
    assert!(event.attributes.get_by_key(LIFECYCLE_NAME).is_none());
    assert!(event.attributes.get_by_key(INSTANCE_NAME).is_none());
    assert_eq!(
        event.timestamp().copied().unwrap(),
        Utc.with_ymd_and_hms(2020, 1, 1, 9, 0, 0).unwrap()
    );
}

#[test]
fn test_start_complete_events_resorted_chronologically() {
    let mut config = CsvConversionConfig::new(
        vec!["case"],
        "activity",
        Some("timestamp"),
        Some("start"),
    );
    config.infer_datatypes = false;
    // Second activity starts before the first one completes
    let csv = "case,activity,timestamp,start\n\
               1,A,2020-01-01 10:00:00,2020-01-01 08:00:00\n\
               1,B,2020-01-01 11:00:00,2020-01-01 09:00:00\n";
    let result = import(csv, &config).unwrap();

    let trace = &result.log.traces[0];
    let timestamps: Vec<_> = trace
        .events
        .iter()
        .map(|e| e.timestamp().copied().unwrap())
        .collect();
    let mut sorted = timestamps.clone();
    sorted.sort();
    assert_eq!(timestamps, sorted);
    assert_eq!(event_activities(trace), vec!["A", "B", "A", "B"]);
}

#[test]
fn test_attributes_and_datatype_overrides() {
    let mut config = base_config();
    // Columns: 0=case, 1=activity, 2=timestamp, 3=amount, 4=urgent
    config.datatype_overrides.insert(3, ColumnDatatype::Continuous);
    config.datatype_overrides.insert(4, ColumnDatatype::Boolean);
    let csv = "case,activity,timestamp,amount,urgent\n\
               1,Register,2020-01-01 08:00:00,49.99,J\n";
    let result = import(csv, &config).unwrap();

    let event = &result.log.traces[0].events[0];
    assert_eq!(
        event.attributes.get_by_key("amount").unwrap().value,
        AttributeValue::Float(49.99)
    );
    assert_eq!(
        event.attributes.get_by_key("urgent").unwrap().value,
        AttributeValue::Boolean(true)
    );
}

#[test]
fn test_null_and_empty_omission() {
    let mut config = base_config();
    config.omit_null_values = true;
    let csv = "case,activity,timestamp,amount,note\n\
               1,Register,2020-01-01 08:00:00,NULL,\n\
               1,Review,2020-01-01 09:00:00,null,ok\n";
    let result = import(csv, &config).unwrap();

    let events = &result.log.traces[0].events;
    assert!(events[0].attributes.get_by_key("amount").is_none());
    assert!(events[0].attributes.get_by_key("note").is_none());
    assert!(events[1].attributes.get_by_key("amount").is_none());
    assert_eq!(
        events[1].attributes.get_by_key("note").unwrap().value,
        AttributeValue::String("ok".to_string())
    );
}

#[test]
fn test_best_effort_keeps_literal_fallback() {
    let mut config = base_config();
    config.datatype_overrides.insert(3, ColumnDatatype::Discrete);
    let csv = "case,activity,timestamp,amount\n\
               1,Register,2020-01-01 08:00:00,abc\n";
    let progress = RecordingProgress::default();
    let result = import_csv_log(csv.as_bytes(), &config, &progress).unwrap();

    let event = &result.log.traces[0].events[0];
    assert_eq!(
        event.attributes.get_by_key("amount").unwrap().value,
        AttributeValue::String("abc".to_string())
    );
    assert_eq!(result.report.error_count(), 1);
    let error = &result.report.field_errors[0];
    assert_eq!(error.line, 2);
    assert_eq!(error.column, "amount");
    assert_eq!(error.raw_value, "abc");
    assert_eq!(error.target, ColumnDatatype::Discrete);
    // Reported through the progress channel as well
    assert!(progress
        .messages
        .lock()
        .unwrap()
        .iter()
        .any(|m| m.contains("abc") && m.contains("amount")));
}

#[test]
fn test_abort_on_error_fails_whole_conversion() {
    let mut config = base_config();
    config.error_mode = ErrorHandlingMode::AbortOnError;
    config.datatype_overrides.insert(3, ColumnDatatype::Discrete);
    let csv = "case,activity,timestamp,amount\n\
               1,Register,2020-01-01 08:00:00,abc\n";
    let err = import(csv, &config).unwrap_err();
    assert!(matches!(err, ConversionError::Field(_)));
}

#[test]
fn test_omit_event_drops_only_offending_row() {
    let mut config = base_config();
    config.error_mode = ErrorHandlingMode::OmitEvent;
    config.datatype_overrides.insert(3, ColumnDatatype::Discrete);
    let csv = "case,activity,timestamp,amount\n\
               1,Register,2020-01-01 08:00:00,1\n\
               1,Review,2020-01-01 09:00:00,abc\n\
               1,Decide,2020-01-01 10:00:00,3\n";
    let result = import(csv, &config).unwrap();

    assert_eq!(
        event_activities(&result.log.traces[0]),
        vec!["Register", "Decide"]
    );
    assert_eq!(result.report.error_count(), 1);
}

#[test]
fn test_omit_trace_drops_whole_case() {
    let mut config = base_config();
    config.error_mode = ErrorHandlingMode::OmitTrace;
    config.datatype_overrides.insert(3, ColumnDatatype::Discrete);
    let csv = "case,activity,timestamp,amount\n\
               1,Register,2020-01-01 08:00:00,1\n\
               1,Review,2020-01-01 09:00:00,abc\n\
               1,Decide,2020-01-01 10:00:00,3\n\
               2,Register,2020-01-01 08:00:00,2\n";
    let result = import(csv, &config).unwrap();

    let ids: Vec<&str> = result.log.traces.iter().map(trace_id).collect();
    assert_eq!(ids, vec!["2"]);
    assert_eq!(result.report.error_count(), 1);
}

#[test]
fn test_config_validation() {
    let config = CsvConversionConfig::new(Vec::<&str>::new(), "activity", Some("timestamp"), None);
    assert_eq!(config.validate(), Err(ConfigError::NoCaseColumns));

    let config = CsvConversionConfig::new(vec!["case"], "activity", None, None);
    assert_eq!(config.validate(), Err(ConfigError::NoTimeColumn));

    let mut config = base_config();
    config.time_format = Some("%Q nonsense %&".to_string());
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidTimeFormat(_))
    ));

    let mut config = base_config();
    config.case_columns = vec!["does-not-exist".to_string()];
    let err = import("case,activity,timestamp\n", &config).unwrap_err();
    assert!(matches!(
        err,
        ConversionError::Config(ConfigError::UnknownColumn(_))
    ));
}

#[test]
fn test_custom_time_format() {
    let mut config = base_config();
    config.time_format = Some("%d/%m/%Y %H:%M".to_string());
    let csv = "case,activity,timestamp\n1,Register,02/03/2020 10:30\n";
    let result = import(csv, &config).unwrap();
    assert_eq!(
        result.log.traces[0].events[0].timestamp().copied().unwrap(),
        Utc.with_ymd_and_hms(2020, 3, 2, 10, 30, 0).unwrap()
    );
}

#[test]
fn test_gz_slice_import() {
    let csv = "case,activity,timestamp\n1,Register,2020-01-01 08:00:00\n";
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(csv.as_bytes()).unwrap();
    let compressed = encoder.finish().unwrap();

    let mut config = base_config();
    config.infer_datatypes = false;
    let result = import_csv_log_slice(&compressed, true, &config, &NoOpProgress).unwrap();
    assert_eq!(result.log.traces.len(), 1);
    assert_eq!(
        result.log.traces[0].events[0]
            .attributes
            .get_by_key(TIMESTAMP_NAME)
            .unwrap()
            .value,
        AttributeValue::Date(Utc.with_ymd_and_hms(2020, 1, 1, 8, 0, 0).unwrap())
    );
}

#[test]
fn test_progress_increments_per_case() {
    let csv = "case,activity,timestamp\n\
               1,Register,2020-01-01 08:00:00\n\
               2,Register,2020-01-01 08:00:00\n\
               3,Register,2020-01-01 08:00:00\n";
    let progress = RecordingProgress::default();
    import_csv_log(csv.as_bytes(), &base_config(), &progress).unwrap();
    assert_eq!(
        progress.increments.load(std::sync::atomic::Ordering::Relaxed),
        3
    );
}
