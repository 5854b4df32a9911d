//! Pipeline assembly
//!
//! Inspects a node's run state and metadata and composes the step
//! chain realizing it. The composition order is fixed; the node's
//! metadata only decides which layers are present.

use std::sync::Arc;

use crate::config::RunSettings;
use crate::filter::TestFilter;
use crate::model::{CaseBehavior, FixtureHooks, NodeKind, TestNode};
use crate::step::{
    CaseStep, ContextStep, ExpectationStep, LifecycleStep, RepeatStep, SkipStep, SuiteStep,
    TestStep, WorkerStep,
};

/// Builds the executable pipeline for a node tree.
#[derive(Clone, Debug, Default)]
pub struct StepBuilder {
    default_timeout_ms: Option<u64>,
}

impl StepBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &RunSettings) -> Self {
        Self {
            default_timeout_ms: settings.default_timeout_ms,
        }
    }

    pub fn with_default_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.default_timeout_ms = Some(timeout_ms);
        self
    }

    /// Build the step that must be executed to realize `node`,
    /// honoring run state first
    pub fn build(&self, node: &Arc<TestNode>, filter: &dyn TestFilter) -> Arc<dyn TestStep> {
        self.build_node(node, filter, &FixtureHooks::default())
    }

    fn build_node(
        &self,
        node: &Arc<TestNode>,
        filter: &dyn TestFilter,
        case_hooks: &FixtureHooks,
    ) -> Arc<dyn TestStep> {
        if !node.run_state().is_runnable() {
            return Arc::new(ContextStep::new(Arc::new(SkipStep::new(node))));
        }
        match node.kind() {
            NodeKind::Case(behavior) => self.build_case(node, behavior, case_hooks),
            NodeKind::Suite => self.build_suite(node, filter, &FixtureHooks::default(), case_hooks),
            NodeKind::Fixture(hooks) => self.build_suite(node, filter, hooks, hooks),
        }
    }

    /// Case composition, innermost first: case executor, expectation,
    /// lifecycle, dedicated worker (timeout), repeat, context
    fn build_case(
        &self,
        node: &Arc<TestNode>,
        behavior: &CaseBehavior,
        case_hooks: &FixtureHooks,
    ) -> Arc<dyn TestStep> {
        let mut step: Arc<dyn TestStep> =
            Arc::new(CaseStep::new(node, Arc::clone(&behavior.body)));

        if let Some(expectation) = &behavior.expectation {
            step = Arc::new(ExpectationStep::new(step, expectation.clone()));
        }

        step = Arc::new(LifecycleStep::new(
            step,
            case_hooks.setups.clone(),
            case_hooks.teardowns.clone(),
        ));

        let timeout_ms = node
            .timeout_ms()
            .or(self.default_timeout_ms)
            .filter(|ms| *ms > 0);
        if timeout_ms.is_some() || node.requires_worker() {
            step = Arc::new(WorkerStep::new(step, timeout_ms));
        }

        let repeat = node.repeat_count();
        if repeat > 1 {
            if let Ok(repeat_step) = RepeatStep::new(Arc::clone(&step), repeat) {
                step = Arc::new(repeat_step);
            }
        }

        Arc::new(ContextStep::new(step))
    }

    /// Suite composition: suite executor over filtered children,
    /// optional dedicated worker (no deadline), context
    fn build_suite(
        &self,
        node: &Arc<TestNode>,
        filter: &dyn TestFilter,
        own_hooks: &FixtureHooks,
        case_hooks: &FixtureHooks,
    ) -> Arc<dyn TestStep> {
        let children: Vec<Arc<dyn TestStep>> = node
            .children()
            .iter()
            .filter(|child| filter.pass(child))
            .map(|child| self.build_node(child, filter, case_hooks))
            .collect();

        let mut step: Arc<dyn TestStep> =
            Arc::new(SuiteStep::new(node, children, own_hooks.clone()));
        if node.requires_worker() {
            step = Arc::new(WorkerStep::new(step, None));
        }
        Arc::new(ContextStep::new(step))
    }
}
