/// Attribute key holding the event class (i.e., activity name)
///
/// Follows the concept XES extension, which is the de-facto standard for
/// identifying activity names in event logs.
pub const ACTIVITY_NAME: &str = "concept:name";
/// Attribute key holding the primary event timestamp
pub const TIMESTAMP_NAME: &str = "time:timestamp";
/// Attribute key holding the lifecycle phase of an event (see [`LIFECYCLE_START`] and [`LIFECYCLE_COMPLETE`])
pub const LIFECYCLE_NAME: &str = "lifecycle:transition";
/// Attribute key correlating a start event with its matching complete event
pub const INSTANCE_NAME: &str = "concept:instance";
/// Common identifying field for trace identities (i.e., case IDs)
///
/// See also [`ACTIVITY_NAME`]
pub const TRACE_ID_NAME: &str = "concept:name";
/// Lifecycle phase marker for the beginning of an activity instance
pub const LIFECYCLE_START: &str = "start";
/// Lifecycle phase marker for the end of an activity instance
pub const LIFECYCLE_COMPLETE: &str = "complete";
/// Delimiter joining the configured case-column values into one composite case key
pub const CASE_KEY_DELIMITER: &str = ":";
