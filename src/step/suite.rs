//! Suite execution
//!
//! The step realizing a suite or fixture: owns one child step per
//! filtered child node and delegates to the suite runner's state
//! machine.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::ExecutionContext;
use crate::executor::SuiteRunner;
use crate::model::{FixtureHooks, TestNode, TestResult};
use crate::step::TestStep;

/// Executes a suite's children in declared order, bracketed by the
/// suite's one-time hooks.
pub struct SuiteStep {
    test: Arc<TestNode>,
    children: Vec<Arc<dyn TestStep>>,
    hooks: FixtureHooks,
}

impl SuiteStep {
    pub fn new(test: &Arc<TestNode>, children: Vec<Arc<dyn TestStep>>, hooks: FixtureHooks) -> Self {
        Self {
            test: Arc::clone(test),
            children,
            hooks,
        }
    }

    pub fn children(&self) -> &[Arc<dyn TestStep>] {
        &self.children
    }

    pub fn hooks(&self) -> &FixtureHooks {
        &self.hooks
    }
}

#[async_trait]
impl TestStep for SuiteStep {
    fn test(&self) -> &Arc<TestNode> {
        &self.test
    }

    async fn execute(&self, ctx: &ExecutionContext) -> TestResult {
        SuiteRunner::new(self).run(ctx).await
    }
}
