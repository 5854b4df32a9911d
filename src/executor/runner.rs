//! Suite traversal
//!
//! The state machine that runs one suite: one-time setup, children in
//! declared order, one-time teardown. Teardown always runs, including
//! after a setup failure.

use tracing::debug;

use crate::context::ExecutionContext;
use crate::model::{FailureSite, Outcome, TestResult};
use crate::step::lifecycle::{run_hooks, run_hooks_reversed};
use crate::step::SuiteStep;
use crate::step::TestStep;

/// Phase of a suite execution
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SuiteState {
    NotStarted,
    SettingUp,
    RunningChildren,
    TearingDown,
    Done,
}

/// Walks a composed suite step, aggregating child results into the
/// suite result and applying the stop-on-error and cancellation
/// policies.
pub struct SuiteRunner<'a> {
    step: &'a SuiteStep,
    state: SuiteState,
}

impl<'a> SuiteRunner<'a> {
    pub fn new(step: &'a SuiteStep) -> Self {
        Self {
            step,
            state: SuiteState::NotStarted,
        }
    }

    pub fn state(&self) -> SuiteState {
        self.state
    }

    pub async fn run(&mut self, ctx: &ExecutionContext) -> TestResult {
        let mut result = TestResult::new(self.step.test());
        result.success(); // assume success; only hooks may override

        self.state = SuiteState::SettingUp;
        match run_hooks(&self.step.hooks().one_time_setups) {
            Ok(()) => {
                self.state = SuiteState::RunningChildren;
                self.run_children(ctx, &mut result).await;
            }
            Err(fault) => {
                // Children are not run and do not appear as attempted
                debug!(
                    "{} one-time setup failed: {fault}",
                    self.step.test().full_name()
                );
                result.record_fault(&fault);
                result.set_site(FailureSite::SetUp);
            }
        }

        self.state = SuiteState::TearingDown;
        if let Err(fault) = run_hooks_reversed(&self.step.hooks().one_time_teardowns) {
            result.record_teardown_fault(&fault);
        }

        self.state = SuiteState::Done;
        result
    }

    async fn run_children(&mut self, ctx: &ExecutionContext, result: &mut TestResult) {
        for child in self.step.children() {
            if ctx.cancel().is_cancelled() {
                result.set(
                    Outcome::Cancelled,
                    Some("Test run cancelled".to_string()),
                    None,
                );
                break;
            }

            let child_result = child.execute(ctx).await;
            let outcome = child_result.outcome;
            result.add_child(child_result);

            // A cancelled child always stops iteration; a failed one
            // only under the stop-on-error policy
            if outcome == Outcome::Cancelled {
                break;
            }
            if outcome.is_failure() && ctx.stop_on_error {
                break;
            }
        }
    }
}
