//! Leaf executors
//!
//! The innermost step actually invoking a case body, and the terminal
//! step for nodes that are not runnable.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;

use crate::context::ExecutionContext;
use crate::model::{CaseBody, Outcome, TestFault, TestNode, TestResult};
use crate::step::TestStep;
use crate::utils::timer::Timer;

/// Runs a case body and records its outcome.
pub struct CaseStep {
    test: Arc<TestNode>,
    body: CaseBody,
}

impl CaseStep {
    pub fn new(test: &Arc<TestNode>, body: CaseBody) -> Self {
        Self {
            test: Arc::clone(test),
            body,
        }
    }
}

#[async_trait]
impl TestStep for CaseStep {
    fn test(&self) -> &Arc<TestNode> {
        &self.test
    }

    async fn execute(&self, ctx: &ExecutionContext) -> TestResult {
        let mut result = TestResult::new(&self.test);
        if ctx.cancel().is_cancelled() {
            result.set(
                Outcome::Cancelled,
                Some("Test run cancelled".to_string()),
                None,
            );
            return result;
        }

        let timer = Timer::start(self.test.full_name());
        let body = (self.body)(ctx.case_context());
        match AssertUnwindSafe(body).catch_unwind().await {
            Ok(Ok(())) => result.success(),
            Ok(Err(fault)) => result.record_fault(&fault),
            Err(payload) => result.record_fault(&TestFault::from_panic(payload)),
        }
        result.duration_secs = timer.elapsed_secs();
        result
    }
}

/// Terminal step for nodes whose run state excludes them: produces a
/// Skipped result without touching hooks, children, or workers.
pub struct SkipStep {
    test: Arc<TestNode>,
}

impl SkipStep {
    pub fn new(test: &Arc<TestNode>) -> Self {
        Self {
            test: Arc::clone(test),
        }
    }
}

#[async_trait]
impl TestStep for SkipStep {
    fn test(&self) -> &Arc<TestNode> {
        &self.test
    }

    async fn execute(&self, _ctx: &ExecutionContext) -> TestResult {
        let mut result = TestResult::new(&self.test);
        result.set(
            Outcome::Skipped,
            self.test.skip_reason().map(str::to_string),
            None,
        );
        result
    }
}
