//! Per-case setup and teardown
//!
//! Setups run top-to-derived before the inner step; teardowns always
//! run afterwards in reverse order, whatever happened in between.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::ExecutionContext;
use crate::model::{FailureSite, LifecycleHook, TestFault, TestNode, TestResult};
use crate::step::TestStep;

/// Invoke a hook, converting a panic into an Error-kind fault
pub(crate) fn invoke_hook(hook: &LifecycleHook) -> Result<(), TestFault> {
    match std::panic::catch_unwind(AssertUnwindSafe(|| hook())) {
        Ok(outcome) => outcome,
        Err(payload) => Err(TestFault::from_panic(payload)),
    }
}

/// Run hooks in declared order, stopping at the first fault
pub(crate) fn run_hooks(hooks: &[LifecycleHook]) -> Result<(), TestFault> {
    for hook in hooks {
        invoke_hook(hook)?;
    }
    Ok(())
}

/// Run hooks in reverse order, stopping at the first fault
pub(crate) fn run_hooks_reversed(hooks: &[LifecycleHook]) -> Result<(), TestFault> {
    for hook in hooks.iter().rev() {
        invoke_hook(hook)?;
    }
    Ok(())
}

/// Wraps a step in the owning fixture's per-case setup/teardown hooks.
pub struct LifecycleStep {
    inner: Arc<dyn TestStep>,
    setups: Vec<LifecycleHook>,
    teardowns: Vec<LifecycleHook>,
}

impl LifecycleStep {
    pub fn new(
        inner: Arc<dyn TestStep>,
        setups: Vec<LifecycleHook>,
        teardowns: Vec<LifecycleHook>,
    ) -> Self {
        Self {
            inner,
            setups,
            teardowns,
        }
    }
}

#[async_trait]
impl TestStep for LifecycleStep {
    fn test(&self) -> &Arc<TestNode> {
        self.inner.test()
    }

    async fn execute(&self, ctx: &ExecutionContext) -> TestResult {
        let mut result = match run_hooks(&self.setups) {
            Ok(()) => self.inner.execute(ctx).await,
            Err(fault) => {
                // Setup fault short-circuits the inner step
                let mut result = TestResult::new(self.inner.test());
                result.record_fault(&fault);
                result.set_site(FailureSite::SetUp);
                result
            }
        };

        if let Err(fault) = run_hooks_reversed(&self.teardowns) {
            result.record_teardown_fault(&fault);
        }
        result
    }
}
