//! Push-based log builder protocol
//!
//! The conversion engine drives a [`CsvConversionHandler`] with one call
//! sequence per sorted row; what kind of log gets built is decided by the
//! handler implementation, not by the engine. The default implementation,
//! [`EventLogConversionHandler`], materializes an in-memory [`EventLog`].

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::event_log::constants::{
    ACTIVITY_NAME, INSTANCE_NAME, LIFECYCLE_COMPLETE, LIFECYCLE_NAME, LIFECYCLE_START,
    TIMESTAMP_NAME, TRACE_ID_NAME,
};
use crate::event_log::{Attribute, AttributeValue, Event, EventLog, Trace};

///
/// Handler interface consumed by the conversion engine
///
/// Call protocol per conversion: `start_log`, then for each case `start_trace`
/// followed by per-row `start_event` / `start_attribute`+`end_attribute`* /
/// `end_event` sequences and a closing `end_trace`; finally `get_result`.
/// `abort_trace` discards the currently open trace (used by the drop-trace
/// error-handling mode).
///
/// Implementations decide how many events one `start_event` call produces:
/// when both a start and a completion timestamp are present, a START/COMPLETE
/// pair sharing a fresh instance id is synthesized.
///
pub trait CsvConversionHandler {
    /// The log representation this handler builds
    type Output;

    /// Called once before any trace, with a descriptor of the source (e.g., the file name)
    fn start_log(&mut self, source: &str);

    /// Open a new case with the given composite case key
    fn start_trace(&mut self, case_id: &str);

    /// Seal the currently open case
    ///
    /// Implementations re-sort the case's events chronologically (stable on
    /// ties) before sealing when start/complete synthesis may have produced
    /// out-of-order events.
    fn end_trace(&mut self, case_id: &str);

    /// Discard the currently open case without sealing it
    fn abort_trace(&mut self);

    /// Begin the event(s) for one source row
    fn start_event(
        &mut self,
        event_class: &str,
        completion_time: Option<DateTime<Utc>>,
        start_time: Option<DateTime<Utc>>,
    );

    /// Add an attribute to the current event
    fn start_attribute(&mut self, name: &str, value: AttributeValue);

    /// Close the attribute opened by the last `start_attribute` call
    fn end_attribute(&mut self) {}

    /// Close the event(s) opened by the last `start_event` call
    fn end_event(&mut self);

    /// Consume the handler and return the built log
    fn get_result(self) -> Self::Output;
}

///
/// Default [`CsvConversionHandler`] building an in-memory [`EventLog`]
///
#[derive(Debug, Default)]
pub struct EventLogConversionHandler {
    log: EventLog,
    current_trace: Option<Trace>,
    /// Events synthesized for the row currently being converted (one, or a
    /// START/COMPLETE pair)
    current_events: Vec<Event>,
    /// Whether the current trace needs a chronological re-sort before sealing
    resort_before_sealing: bool,
}

impl EventLogConversionHandler {
    /// Create a handler building an empty [`EventLog`]
    pub fn new() -> Self {
        Self::default()
    }

    fn make_event(
        event_class: &str,
        timestamp: Option<DateTime<Utc>>,
        lifecycle: Option<&str>,
        instance: Option<Uuid>,
    ) -> Event {
        let mut event = Event::new(event_class.to_string());
        if let Some(ts) = timestamp {
            event
                .attributes
                .push(Attribute::new(TIMESTAMP_NAME.to_string(), AttributeValue::Date(ts)));
        }
        if let Some(phase) = lifecycle {
            event.attributes.push(Attribute::new(
                LIFECYCLE_NAME.to_string(),
                AttributeValue::String(phase.to_string()),
            ));
        }
        if let Some(id) = instance {
            event
                .attributes
                .push(Attribute::new(INSTANCE_NAME.to_string(), AttributeValue::ID(id)));
        }
        event
    }
}

impl CsvConversionHandler for EventLogConversionHandler {
    type Output = EventLog;

    fn start_log(&mut self, source: &str) {
        self.log.attributes.push(Attribute::new(
            ACTIVITY_NAME.to_string(),
            AttributeValue::String(source.to_string()),
        ));
    }

    fn start_trace(&mut self, case_id: &str) {
        self.current_trace = Some(Trace {
            attributes: vec![Attribute::new(
                TRACE_ID_NAME.to_string(),
                AttributeValue::String(case_id.to_string()),
            )],
            events: Vec::new(),
        });
        self.resort_before_sealing = false;
    }

    fn end_trace(&mut self, _case_id: &str) {
        if let Some(mut trace) = self.current_trace.take() {
            if self.resort_before_sealing {
                // Stable, so arrival order is preserved on equal timestamps;
                // events without a timestamp sort first
                trace
                    .events
                    .sort_by_key(|e| e.timestamp().copied());
            }
            trace.events.shrink_to_fit();
            self.log.traces.push(trace);
        }
    }

    fn abort_trace(&mut self) {
        self.current_trace = None;
        self.current_events.clear();
    }

    fn start_event(
        &mut self,
        event_class: &str,
        completion_time: Option<DateTime<Utc>>,
        start_time: Option<DateTime<Utc>>,
    ) {
        self.current_events.clear();
        match (start_time, completion_time) {
            (Some(start), Some(completion)) => {
                // Two events sharing a freshly generated instance id
                let instance = Uuid::new_v4();
                self.current_events.push(Self::make_event(
                    event_class,
                    Some(start),
                    Some(LIFECYCLE_START),
                    Some(instance),
                ));
                self.current_events.push(Self::make_event(
                    event_class,
                    Some(completion),
                    Some(LIFECYCLE_COMPLETE),
                    Some(instance),
                ));
                self.resort_before_sealing = true;
            }
            (start, completion) => {
                // At most one timestamp populated: exactly one untagged event
                self.current_events
                    .push(Self::make_event(event_class, completion.or(start), None, None));
            }
        }
    }

    fn start_attribute(&mut self, name: &str, value: AttributeValue) {
        // Attributes attach to the primary (complete) event of the row
        if let Some(event) = self.current_events.last_mut() {
            event
                .attributes
                .push(Attribute::new(name.to_string(), value));
        }
    }

    fn end_event(&mut self) {
        if let Some(trace) = &mut self.current_trace {
            trace.events.append(&mut self.current_events);
        } else {
            self.current_events.clear();
        }
    }

    fn get_result(self) -> EventLog {
        self.log
    }
}
