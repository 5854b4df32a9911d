//! Context establishment
//!
//! The outermost layer of every pipeline: derives the execution scope
//! for the node, notifies the listener, and stamps duration and assert
//! count onto the result.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::context::ExecutionContext;
use crate::model::{TestNode, TestResult};
use crate::step::TestStep;
use crate::utils::timer::Timer;

/// Establishes the execution scope around the inner step.
pub struct ContextStep {
    inner: Arc<dyn TestStep>,
}

impl ContextStep {
    pub fn new(inner: Arc<dyn TestStep>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl TestStep for ContextStep {
    fn test(&self) -> &Arc<TestNode> {
        self.inner.test()
    }

    async fn execute(&self, ctx: &ExecutionContext) -> TestResult {
        let test = self.inner.test();
        let scope = ctx.enter(test);
        debug!("running {}", test.full_name());
        scope.listener().on_start(test);

        let timer = Timer::start(test.full_name());
        let mut result = self.inner.execute(&scope).await;
        result.duration_secs = timer.elapsed_secs();
        result.assert_count = scope.assert_count();

        scope.listener().on_finish(&result);
        result
        // dropping the scope restores the caller's context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunSettings;
    use crate::listener::{ListenerEvent, RecordingListener};
    use crate::model::{NodeKind, Outcome};
    use crate::step::CaseStep;

    fn case_step(node: TestNode) -> Arc<dyn TestStep> {
        let node = Arc::new(node);
        match node.kind() {
            NodeKind::Case(behavior) => {
                let body = Arc::clone(&behavior.body);
                Arc::new(CaseStep::new(&node, body))
            }
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_listener_sees_start_then_finish() {
        let listener = Arc::new(RecordingListener::new());
        let ctx = ExecutionContext::new(Arc::clone(&listener) as _, &RunSettings::default());

        let step = ContextStep::new(case_step(TestNode::sync_case("t", |_ctx| Ok(()))));
        step.execute(&ctx).await;

        assert_eq!(
            listener.events(),
            vec![
                ListenerEvent::Started("t".to_string()),
                ListenerEvent::Finished("t".to_string(), Outcome::Success),
            ]
        );
    }

    #[tokio::test]
    async fn test_assert_count_recorded_on_result() {
        let listener = Arc::new(RecordingListener::new());
        let ctx = ExecutionContext::new(listener as _, &RunSettings::default());

        let step = ContextStep::new(case_step(TestNode::sync_case("t", |case_ctx| {
            case_ctx.count_assert();
            case_ctx.count_assert();
            case_ctx.count_assert();
            Ok(())
        })));

        let result = step.execute(&ctx).await;
        assert_eq!(result.assert_count, 3);
    }

    #[tokio::test]
    async fn test_duration_is_stamped() {
        let listener = Arc::new(RecordingListener::new());
        let ctx = ExecutionContext::new(listener as _, &RunSettings::default());

        let step = ContextStep::new(case_step(TestNode::case("t", |_ctx| {
            Box::pin(async {
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                Ok(())
            })
        })));

        let result = step.execute(&ctx).await;
        assert!(result.duration_secs >= 0.015);
    }
}
