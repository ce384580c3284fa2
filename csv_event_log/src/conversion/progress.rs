//! Progress reporting and cooperative cancellation
//!
//! The conversion pipeline consumes only this narrow interface; plugin hosts,
//! progress bars and logging sinks live behind it. Cancellation is polled at
//! row-batch or case granularity, never per row.

///
/// Progress updates, log messages and cooperative cancellation checks
///
/// All methods default to no-ops (and `is_cancelled` to `false`), so
/// implementations only override what they need.
///
pub trait ConversionProgress {
    /// Set the progress bounds (e.g., before a pass with a known denominator)
    fn set_bounds(&self, _min: u64, _max: u64) {}

    /// Increment the progress by one step
    fn increment(&self) {}

    /// Whether the user requested cancellation
    ///
    /// Once this returns `true` the running operation cleans up all temporary
    /// resources and terminates with a cancellation signal.
    fn is_cancelled(&self) -> bool {
        false
    }

    /// Report a human-readable progress or error message
    fn log(&self, _message: &str) {}
}

///
/// [`ConversionProgress`] implementation that ignores everything
///
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpProgress;

impl ConversionProgress for NoOpProgress {}
