//! Fault expectation
//!
//! Inverts the verdict for cases declared to raise a fault: the raised
//! fault is matched against the expectation by name and message.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::ExecutionContext;
use crate::model::{FaultExpectation, Outcome, TestFault, TestNode, TestResult};
use crate::step::TestStep;

/// Wraps a case whose body is expected to raise a fault.
pub struct ExpectationStep {
    inner: Arc<dyn TestStep>,
    expectation: FaultExpectation,
}

impl ExpectationStep {
    pub fn new(inner: Arc<dyn TestStep>, expectation: FaultExpectation) -> Self {
        Self { inner, expectation }
    }
}

#[async_trait]
impl TestStep for ExpectationStep {
    fn test(&self) -> &Arc<TestNode> {
        self.inner.test()
    }

    async fn execute(&self, ctx: &ExecutionContext) -> TestResult {
        let mut result = self.inner.execute(ctx).await;

        match result.raised.take() {
            None => {
                if result.outcome == Outcome::Success {
                    result.set(
                        Outcome::Failure,
                        Some(self.expectation.no_fault_message()),
                        None,
                    );
                }
            }
            Some(fault) => self.process_fault(&mut result, fault),
        }
        result
    }
}

impl ExpectationStep {
    fn process_fault(&self, result: &mut TestResult, fault: TestFault) {
        if !self.expectation.name_matches(&fault) {
            // Record as raised; an Error is downgraded to a Failure
            // naming the expected and actual fault
            result.record_fault(&fault);
            if result.outcome == Outcome::Error {
                result.set(
                    Outcome::Failure,
                    Some(self.expectation.wrong_type_message(&fault)),
                    fault.trace.clone(),
                );
            }
            return;
        }

        if !self.expectation.message_matches(&fault) {
            result.set(
                Outcome::Failure,
                Some(self.expectation.wrong_text_message(&fault)),
                fault.trace.clone(),
            );
            return;
        }

        if let Some(handler) = &self.expectation.handler {
            if let Err(payload) = std::panic::catch_unwind(AssertUnwindSafe(|| handler(&fault))) {
                result.record_fault(&TestFault::from_panic(payload));
                return;
            }
        }
        result.set(Outcome::Success, None, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::config::RunSettings;
    use crate::listener::NullListener;
    use crate::model::MatchMode;
    use crate::step::CaseStep;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(Arc::new(NullListener), &RunSettings::default())
    }

    fn case(body: impl Fn() -> Result<(), TestFault> + Send + Sync + 'static) -> Arc<dyn TestStep> {
        let node = Arc::new(TestNode::sync_case("t", move |_ctx| body()));
        match node.kind() {
            crate::model::NodeKind::Case(behavior) => {
                let body = Arc::clone(&behavior.body);
                Arc::new(CaseStep::new(&node, body))
            }
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_matching_fault_and_message_succeeds() {
        let expectation =
            FaultExpectation::of("IoFault").with_message("abc", MatchMode::Contains);
        let step = ExpectationStep::new(
            case(|| Err(TestFault::error("IoFault", "xabcx"))),
            expectation,
        );

        let result = step.execute(&ctx()).await;
        assert_eq!(result.outcome, Outcome::Success);
        assert_eq!(result.message, None);
    }

    #[tokio::test]
    async fn test_wrong_fault_type_downgrades_error_to_failure() {
        let expectation = FaultExpectation::of("IoFault");
        let step = ExpectationStep::new(
            case(|| Err(TestFault::error("ParseFault", "bad token"))),
            expectation,
        );

        let result = step.execute(&ctx()).await;
        assert_eq!(result.outcome, Outcome::Failure);
        let message = result.message.as_deref().unwrap_or_default();
        assert!(message.contains("Expected: IoFault"));
        assert!(message.contains("ParseFault : bad token"));
    }

    #[tokio::test]
    async fn test_wrong_message_text_fails_with_explanation() {
        let expectation = FaultExpectation::of("IoFault").with_message("abc", MatchMode::Exact);
        let step = ExpectationStep::new(
            case(|| Err(TestFault::error("IoFault", "abcd"))),
            expectation,
        );

        let result = step.execute(&ctx()).await;
        assert_eq!(result.outcome, Outcome::Failure);
        let message = result.message.as_deref().unwrap_or_default();
        assert!(message.contains("Expected: abc"));
        assert!(message.contains(" but was: abcd"));
    }

    #[tokio::test]
    async fn test_no_fault_when_one_expected_fails() {
        let expectation = FaultExpectation::of("IoFault");
        let step = ExpectationStep::new(case(|| Ok(())), expectation);

        let result = step.execute(&ctx()).await;
        assert_eq!(result.outcome, Outcome::Failure);
        assert_eq!(result.message.as_deref(), Some("IoFault was expected"));
    }

    #[tokio::test]
    async fn test_unnamed_expectation_accepts_any_fault() {
        let step = ExpectationStep::new(
            case(|| Err(TestFault::assertion("whatever"))),
            FaultExpectation::any(),
        );

        let result = step.execute(&ctx()).await;
        assert_eq!(result.outcome, Outcome::Success);
    }

    #[tokio::test]
    async fn test_handler_sees_matched_fault() {
        let calls = Arc::new(AtomicU32::new(0));
        let handler_calls = Arc::clone(&calls);
        let expectation = FaultExpectation::of("IoFault").with_handler(move |fault| {
            assert_eq!(fault.message, "boom");
            handler_calls.fetch_add(1, Ordering::SeqCst);
        });
        let step = ExpectationStep::new(case(|| Err(TestFault::error("IoFault", "boom"))), expectation);

        let result = step.execute(&ctx()).await;
        assert_eq!(result.outcome, Outcome::Success);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
