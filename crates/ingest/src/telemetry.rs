//! Error-tracking sink.
//!
//! Fire-and-forget: tracking never affects control flow. Degraded-but-
//! non-fatal failures (one bad package in a deprecation batch, an oversized
//! metadatum's field diagnostics) land here instead of aborting their
//! surroundings.

use std::fmt::Display;
use std::sync::Mutex;

/// Context key/value pairs attached to a tracked exception.
pub type Context = Vec<(&'static str, String)>;

/// Error-tracking sink.
pub trait ErrorTracker: Send + Sync {
    fn track_exception(&self, error: &dyn Display, context: &Context);
}

/// Routes tracked exceptions to the `tracing` error stream.
pub struct TracingTracker;

impl ErrorTracker for TracingTracker {
    fn track_exception(&self, error: &dyn Display, context: &Context) {
        tracing::error!(error = %error, context = ?context, "tracked exception");
    }
}

/// Records tracked exceptions for assertions in tests.
#[derive(Default)]
pub struct RecordingTracker {
    events: Mutex<Vec<(String, Context)>>,
}

impl RecordingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the tracked events.
    pub fn events(&self) -> Vec<(String, Context)> {
        self.events.lock().unwrap().clone()
    }
}

impl ErrorTracker for RecordingTracker {
    fn track_exception(&self, error: &dyn Display, context: &Context) {
        self.events
            .lock()
            .unwrap()
            .push((error.to_string(), context.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_tracker_captures_context() {
        let tracker = RecordingTracker::new();
        tracker.track_exception(
            &"metadatum too large",
            &vec![("package_name", "foo".to_string())],
        );
        let events = tracker.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "metadatum too large");
        assert_eq!(events[0].1[0].1, "foo");
    }
}
