//! Repetition
//!
//! Runs the inner step up to a fixed number of times, stopping at the
//! first failing repetition.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::context::ExecutionContext;
use crate::errors::EngineError;
use crate::model::{TestNode, TestResult};
use crate::step::TestStep;

/// Repeats the inner step; the last-produced result is returned.
pub struct RepeatStep {
    inner: Arc<dyn TestStep>,
    count: u32,
}

impl RepeatStep {
    pub fn new(inner: Arc<dyn TestStep>, count: u32) -> Result<Self, EngineError> {
        if count < 1 {
            return Err(EngineError::argument("repeat count must be at least 1"));
        }
        Ok(Self { inner, count })
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

#[async_trait]
impl TestStep for RepeatStep {
    fn test(&self) -> &Arc<TestNode> {
        self.inner.test()
    }

    async fn execute(&self, ctx: &ExecutionContext) -> TestResult {
        let mut result = self.inner.execute(ctx).await;
        let mut runs = 1;
        while runs < self.count && !result.outcome.halts_repeat() {
            result = self.inner.execute(ctx).await;
            runs += 1;
        }
        if result.outcome.halts_repeat() && runs < self.count {
            debug!(
                "{} stopped after repetition {} of {}",
                self.inner.test().full_name(),
                runs,
                self.count
            );
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::config::RunSettings;
    use crate::listener::NullListener;
    use crate::model::{Outcome, TestFault};
    use crate::step::CaseStep;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(Arc::new(NullListener), &RunSettings::default())
    }

    fn counting_case(
        runs: &Arc<AtomicU32>,
        body: impl Fn(u32) -> Result<(), TestFault> + Send + Sync + 'static,
    ) -> Arc<dyn TestStep> {
        let runs = Arc::clone(runs);
        let node = Arc::new(TestNode::sync_case("t", move |_ctx| {
            let run = runs.fetch_add(1, Ordering::SeqCst) + 1;
            body(run)
        }));
        match node.kind() {
            crate::model::NodeKind::Case(behavior) => {
                let body = Arc::clone(&behavior.body);
                Arc::new(CaseStep::new(&node, body))
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_zero_count_is_rejected() {
        let runs = Arc::new(AtomicU32::new(0));
        let inner = counting_case(&runs, |_| Ok(()));
        assert!(matches!(
            RepeatStep::new(inner, 0),
            Err(EngineError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_all_repetitions_run_on_success() {
        let runs = Arc::new(AtomicU32::new(0));
        let inner = counting_case(&runs, |_| Ok(()));
        let step = RepeatStep::new(inner, 3).expect("count is valid");

        let result = step.execute(&ctx()).await;
        assert_eq!(result.outcome, Outcome::Success);
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_stops_at_first_failing_repetition() {
        let runs = Arc::new(AtomicU32::new(0));
        let inner = counting_case(&runs, |run| {
            if run == 2 {
                Err(TestFault::assertion("flaked on second run"))
            } else {
                Ok(())
            }
        });
        let step = RepeatStep::new(inner, 3).expect("count is valid");

        let result = step.execute(&ctx()).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(result.outcome, Outcome::Failure);
        assert_eq!(result.message.as_deref(), Some("flaked on second run"));
    }

    #[tokio::test]
    async fn test_inconclusive_does_not_stop_repetitions() {
        let runs = Arc::new(AtomicU32::new(0));
        let inner = counting_case(&runs, |run| {
            if run == 1 {
                Err(TestFault::inconclusive("warming up"))
            } else {
                Ok(())
            }
        });
        let step = RepeatStep::new(inner, 3).expect("count is valid");

        let result = step.execute(&ctx()).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert_eq!(result.outcome, Outcome::Success);
    }
}
