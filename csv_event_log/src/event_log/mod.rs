/// Standard attribute keys and markers
pub mod constants;
/// [`EventLog`] struct and sub-structs
pub mod event_log_struct;

pub use event_log_struct::{
    Attribute, AttributeValue, Attributes, EditableAttributes, Event, EventLog, Trace,
};
