//! Sub-run boundary
//!
//! One independently executable unit of a larger run, reached only
//! through the `SubRunner` trait. The isolation mechanism behind the
//! boundary (separate process, separate host) is a collaborator;
//! `LocalSubRunner` is the in-process implementation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::config::RunSettings;
use crate::context::ExecutionContext;
use crate::filter::TestFilter;
use crate::listener::TestListener;
use crate::model::{RunSummary, TestNode, TestResult};
use crate::step::StepBuilder;

/// Boundary contract for one sub-run of a larger test run.
#[async_trait]
pub trait SubRunner: Send + Sync {
    /// Prepare the sub-run for execution
    async fn load(&self) -> Result<()>;

    /// Execute the sub-run, returning its result tree
    async fn run(&self, listener: Arc<dyn TestListener>, filter: Arc<dyn TestFilter>)
        -> TestResult;

    /// Number of cases that would run under `filter`
    fn count_test_cases(&self, filter: &dyn TestFilter) -> usize;

    /// Request cooperative (or forced) cancellation of an in-flight run
    fn stop_run(&self, force: bool);

    /// Release whatever `load` acquired
    async fn unload(&self) -> Result<()>;
}

/// In-process sub-runner binding a node tree and run settings.
///
/// Each `run` builds a fresh pipeline, so a runner can be run again
/// after completion or cancellation.
pub struct LocalSubRunner {
    tree: Arc<TestNode>,
    settings: RunSettings,
    loaded: AtomicBool,
    active_cancel: Mutex<CancelToken>,
}

impl LocalSubRunner {
    pub fn new(tree: TestNode, settings: RunSettings) -> Self {
        Self::from_shared(Arc::new(tree), settings)
    }

    pub fn from_shared(tree: Arc<TestNode>, settings: RunSettings) -> Self {
        Self {
            tree,
            settings,
            loaded: AtomicBool::new(false),
            active_cancel: Mutex::new(CancelToken::new()),
        }
    }

    pub fn tree(&self) -> &Arc<TestNode> {
        &self.tree
    }

    fn arm_cancel(&self) -> CancelToken {
        let token = CancelToken::new();
        match self.active_cancel.lock() {
            Ok(mut guard) => *guard = token.clone(),
            Err(poisoned) => *poisoned.into_inner() = token.clone(),
        }
        token
    }

    fn current_cancel(&self) -> CancelToken {
        match self.active_cancel.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl SubRunner for LocalSubRunner {
    async fn load(&self) -> Result<()> {
        self.loaded.store(true, Ordering::Release);
        debug!("loaded {}", self.tree.full_name());
        Ok(())
    }

    async fn run(
        &self,
        listener: Arc<dyn TestListener>,
        filter: Arc<dyn TestFilter>,
    ) -> TestResult {
        if !self.loaded.load(Ordering::Acquire) {
            debug!("running {} without an explicit load", self.tree.full_name());
        }

        let token = self.arm_cancel();
        let builder = StepBuilder::from_settings(&self.settings);
        let step = builder.build(&self.tree, filter.as_ref());
        let ctx = ExecutionContext::new(listener, &self.settings).with_cancel(token);

        let result = step.execute(&ctx).await;
        info!(
            "completed {}: {}",
            self.tree.full_name(),
            RunSummary::of(&result)
        );
        result
    }

    fn count_test_cases(&self, filter: &dyn TestFilter) -> usize {
        self.tree.count_test_cases(filter)
    }

    fn stop_run(&self, force: bool) {
        if force {
            // Forced stop still relies on tests reaching a suspension
            // point; work that blocks cannot be interrupted in-process
            warn!("forced stop requested for {}", self.tree.full_name());
        }
        self.current_cancel().cancel();
    }

    async fn unload(&self) -> Result<()> {
        self.loaded.store(false, Ordering::Release);
        debug!("unloaded {}", self.tree.full_name());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    use crate::filter::{AllTests, NameFilter};
    use crate::listener::{ListenerEvent, NullListener, RecordingListener};
    use crate::model::Outcome;

    fn sample_tree() -> TestNode {
        TestNode::suite("pkg").with_child(
            TestNode::fixture("MathTests")
                .with_child(TestNode::sync_case("adds", |_ctx| Ok(())))
                .with_child(TestNode::sync_case("subtracts", |_ctx| Ok(()))),
        )
    }

    #[tokio::test]
    async fn test_run_produces_result_tree_in_declared_order() {
        let runner = LocalSubRunner::new(sample_tree(), RunSettings::default());
        runner.load().await.expect("load succeeds");

        let result = runner
            .run(Arc::new(NullListener), Arc::new(AllTests))
            .await;

        assert_eq!(result.outcome, Outcome::Success);
        let fixture = &result.children[0];
        let names: Vec<_> = fixture.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["adds", "subtracts"]);

        let summary = RunSummary::of(&result);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.passed, 2);
    }

    #[tokio::test]
    async fn test_listener_events_nest_correctly() {
        let runner = LocalSubRunner::new(sample_tree(), RunSettings::default());
        let listener = Arc::new(RecordingListener::new());

        runner
            .run(Arc::clone(&listener) as _, Arc::new(AllTests))
            .await;

        let events = listener.events();
        assert_eq!(
            events.first(),
            Some(&ListenerEvent::Started("pkg".to_string()))
        );
        assert_eq!(
            events.get(1),
            Some(&ListenerEvent::Started("pkg.MathTests".to_string()))
        );
        assert!(matches!(
            events.last(),
            Some(ListenerEvent::Finished(name, Outcome::Success)) if name == "pkg"
        ));
    }

    #[tokio::test]
    async fn test_filter_limits_the_run() {
        let runner = LocalSubRunner::new(sample_tree(), RunSettings::default());
        assert_eq!(runner.count_test_cases(&AllTests), 2);
        assert_eq!(runner.count_test_cases(&NameFilter::new("adds")), 1);

        let result = runner
            .run(Arc::new(NullListener), Arc::new(NameFilter::new("adds")))
            .await;
        let fixture = &result.children[0];
        assert_eq!(fixture.children.len(), 1);
        assert_eq!(fixture.children[0].name, "adds");
    }

    #[tokio::test]
    async fn test_stop_run_cancels_remaining_cases() {
        let later_runs = Arc::new(AtomicU32::new(0));
        let later = Arc::clone(&later_runs);

        let tree = TestNode::suite("pkg").with_child(
            TestNode::fixture("f")
                .with_child(TestNode::sync_case("first", move |case_ctx| {
                    // Simulates an external stop arriving mid-run
                    case_ctx.cancel.cancel();
                    Ok(())
                }))
                .with_child(TestNode::sync_case("second", move |_ctx| {
                    later.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })),
        );

        let runner = LocalSubRunner::new(tree, RunSettings::default());
        let result = runner
            .run(Arc::new(NullListener), Arc::new(AllTests))
            .await;

        let fixture = &result.children[0];
        assert_eq!(fixture.outcome, Outcome::Cancelled);
        assert_eq!(fixture.children.len(), 1);
        assert_eq!(later_runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_runner_can_run_again_after_cancellation() {
        let runner = LocalSubRunner::new(sample_tree(), RunSettings::default());
        runner.stop_run(false);

        // A fresh pipeline gets a fresh token; the old stop request
        // does not poison the next run
        let result = runner
            .run(Arc::new(NullListener), Arc::new(AllTests))
            .await;
        assert_eq!(result.outcome, Outcome::Success);
    }
}
