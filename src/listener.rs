//! Run listeners
//!
//! Real-time notifications emitted as nodes begin and complete.

use std::sync::Mutex;

use tracing::info;

use crate::model::{Outcome, TestNode, TestResult};

/// Receives start/finish notifications as the pipeline executes.
pub trait TestListener: Send + Sync {
    fn on_start(&self, test: &TestNode);
    fn on_finish(&self, result: &TestResult);
}

/// Listener that ignores every notification
pub struct NullListener;

impl TestListener for NullListener {
    fn on_start(&self, _test: &TestNode) {}
    fn on_finish(&self, _result: &TestResult) {}
}

/// Listener that logs progress through `tracing`
pub struct LoggingListener;

impl TestListener for LoggingListener {
    fn on_start(&self, test: &TestNode) {
        info!("started {test}");
    }

    fn on_finish(&self, result: &TestResult) {
        info!("finished {result}");
    }
}

/// One recorded notification
#[derive(Clone, Debug, PartialEq)]
pub enum ListenerEvent {
    Started(String),
    Finished(String, Outcome),
}

/// Listener that records notifications in arrival order, for embedders
/// that need to assert on event sequences
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<ListenerEvent>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ListenerEvent> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn push(&self, event: ListenerEvent) {
        match self.events.lock() {
            Ok(mut guard) => guard.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

impl TestListener for RecordingListener {
    fn on_start(&self, test: &TestNode) {
        self.push(ListenerEvent::Started(test.full_name().to_string()));
    }

    fn on_finish(&self, result: &TestResult) {
        self.push(ListenerEvent::Finished(
            result.full_name.clone(),
            result.outcome,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_listener_keeps_order() {
        let listener = RecordingListener::new();
        let node = TestNode::sync_case("t", |_ctx| Ok(()));
        let mut result = TestResult::new(&node);
        result.success();

        listener.on_start(&node);
        listener.on_finish(&result);

        assert_eq!(
            listener.events(),
            vec![
                ListenerEvent::Started("t".to_string()),
                ListenerEvent::Finished("t".to_string(), Outcome::Success),
            ]
        );
    }
}
