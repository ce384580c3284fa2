use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use crate::conversion::config::CsvConversionConfig;
use crate::conversion::progress::ConversionProgress;
use crate::event_log::constants::{ACTIVITY_NAME, TRACE_ID_NAME};
use crate::event_log::{EditableAttributes, Trace};

mod conversion_tests;
mod tokenizer_tests;

/// Progress double recording bounds, increments and messages, with a
/// settable cancellation flag
#[derive(Debug, Default)]
pub(crate) struct RecordingProgress {
    pub cancelled: AtomicBool,
    pub increments: AtomicU64,
    pub bounds: Mutex<Option<(u64, u64)>>,
    pub messages: Mutex<Vec<String>>,
}

impl RecordingProgress {
    pub fn cancelled() -> Self {
        let progress = Self::default();
        progress.cancelled.store(true, Ordering::Relaxed);
        progress
    }
}

impl ConversionProgress for RecordingProgress {
    fn set_bounds(&self, min: u64, max: u64) {
        *self.bounds.lock().unwrap() = Some((min, max));
    }

    fn increment(&self) {
        self.increments.fetch_add(1, Ordering::Relaxed);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    fn log(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

/// Mapping used by most tests: `case` column, `activity` event class,
/// `timestamp` completion time; datatype inference off unless a test opts in
pub(crate) fn base_config() -> CsvConversionConfig {
    let mut config =
        CsvConversionConfig::new(vec!["case"], "activity", Some("timestamp"), None);
    config.infer_datatypes = false;
    config
}

pub(crate) fn trace_id(trace: &Trace) -> &str {
    trace
        .attributes
        .get_by_key(TRACE_ID_NAME)
        .and_then(|a| a.value.try_as_string())
        .map(|s| s.as_str())
        .unwrap_or("")
}

pub(crate) fn event_activities(trace: &Trace) -> Vec<&str> {
    trace
        .events
        .iter()
        .filter_map(|e| {
            e.attributes
                .get_by_key(ACTIVITY_NAME)
                .and_then(|a| a.value.try_as_string())
                .map(|s| s.as_str())
        })
        .collect()
}
